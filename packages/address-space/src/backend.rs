//! Value backends: where a Variable's value comes from.
//!
//! A value-carrying node has exactly one backend at a time:
//!
//! - [`ValueBackend::Static`]: the server stores the value.
//! - [`ValueBackend::Callback`]: the server stores the value and notifies
//!   observers around each access.
//! - [`ValueBackend::DataSource`]: nothing is stored; reads and writes are
//!   forwarded to user functions.
//!
//! Hooks and data source functions are always called with the address space
//! unlocked. A hook must not write the node it is observing.

use std::fmt;
use std::sync::Arc;

use crate::{DataValue, Error, NodeId, NumericRange, Variant};

/// Called before a callback-backed value is read.
pub type ReadHook = Arc<dyn Fn(&NodeId, Option<&NumericRange>) + Send + Sync>;

/// Called after a callback-backed value was written, with the value now stored.
pub type WriteHook = Arc<dyn Fn(&NodeId, &Variant, Option<&NumericRange>) + Send + Sync>;

/// Produces the value of a data source node.
///
/// Arguments are the node, whether a source timestamp is wanted, and the
/// requested index range.
pub type DataSourceRead =
    Arc<dyn Fn(&NodeId, bool, Option<&NumericRange>) -> Result<DataValue, Error> + Send + Sync>;

/// Consumes a value written to a data source node.
pub type DataSourceWrite =
    Arc<dyn Fn(&NodeId, &Variant, Option<&NumericRange>) -> Result<(), Error> + Send + Sync>;

/// Observer hooks for a server-held value.
#[derive(Clone, Default)]
pub struct ValueCallback {
    pub on_read: Option<ReadHook>,
    pub on_write: Option<WriteHook>,
}

impl ValueCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_read<F>(mut self, f: F) -> Self
    where
        F: Fn(&NodeId, Option<&NumericRange>) + Send + Sync + 'static,
    {
        self.on_read = Some(Arc::new(f));
        self
    }

    pub fn on_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&NodeId, &Variant, Option<&NumericRange>) + Send + Sync + 'static,
    {
        self.on_write = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ValueCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCallback")
            .field("on_read", &self.on_read.is_some())
            .field("on_write", &self.on_write.is_some())
            .finish()
    }
}

/// An external provider of a node's value.
///
/// Without a write function the source is read-only and writes fail with
/// `WriteUnsupported`. Index ranges are only passed through when the source
/// declares support for them; otherwise a ranged access fails with
/// `IndexRangeInvalid` before the source is called.
#[derive(Clone)]
pub struct DataSource {
    read: DataSourceRead,
    write: Option<DataSourceWrite>,
    supports_index_range: bool,
}

impl DataSource {
    /// A read-only data source.
    pub fn read_only<F>(read: F) -> Self
    where
        F: Fn(&NodeId, bool, Option<&NumericRange>) -> Result<DataValue, Error>
            + Send
            + Sync
            + 'static,
    {
        Self {
            read: Arc::new(read),
            write: None,
            supports_index_range: false,
        }
    }

    pub fn with_write<F>(mut self, write: F) -> Self
    where
        F: Fn(&NodeId, &Variant, Option<&NumericRange>) -> Result<(), Error>
            + Send
            + Sync
            + 'static,
    {
        self.write = Some(Arc::new(write));
        self
    }

    /// Declare that the source handles index ranges itself.
    pub fn with_index_range(mut self) -> Self {
        self.supports_index_range = true;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }

    pub fn supports_index_range(&self) -> bool {
        self.supports_index_range
    }

    pub(crate) fn read_fn(&self) -> DataSourceRead {
        Arc::clone(&self.read)
    }

    pub(crate) fn write_fn(&self) -> Option<DataSourceWrite> {
        self.write.clone()
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("writable", &self.is_writable())
            .field("supports_index_range", &self.supports_index_range)
            .finish()
    }
}

/// The active backend of a value attribute.
#[derive(Clone, Debug)]
pub enum ValueBackend {
    Static(DataValue),
    Callback {
        value: DataValue,
        callback: ValueCallback,
    },
    DataSource(DataSource),
}

/// Which kind of backend is active, without its contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueBackendKind {
    Static,
    Callback,
    DataSource,
}

impl ValueBackend {
    pub fn kind(&self) -> ValueBackendKind {
        match self {
            ValueBackend::Static(_) => ValueBackendKind::Static,
            ValueBackend::Callback { .. } => ValueBackendKind::Callback,
            ValueBackend::DataSource(_) => ValueBackendKind::DataSource,
        }
    }

    /// The server-held value, if this backend stores one.
    pub fn stored(&self) -> Option<&DataValue> {
        match self {
            ValueBackend::Static(value) | ValueBackend::Callback { value, .. } => Some(value),
            ValueBackend::DataSource(_) => None,
        }
    }
}

impl Default for ValueBackend {
    fn default() -> Self {
        ValueBackend::Static(DataValue::default())
    }
}
