//! Error types for the address space.

use std::fmt;

use crate::{AttributeId, NodeClass, NodeId};

/// Errors returned by node store and attribute dispatch operations.
///
/// No operation retries on its own; the caller decides what to do with a
/// failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("reference not found: {node} -[{reference_type}]-> {target}")]
    ReferenceNotFound {
        node: NodeId,
        reference_type: NodeId,
        target: NodeId,
    },

    #[error("node id already in use: {0}")]
    IdentifierConflict(NodeId),

    #[error("invalid node class {class} for {node}: {reason}")]
    InvalidNodeClass {
        node: NodeId,
        class: NodeClass,
        reason: String,
    },

    #[error("attribute {attribute} of {node} is immutable")]
    AttributeImmutable { node: NodeId, attribute: AttributeId },

    #[error("attribute {attribute} does not apply to {class} node {node}")]
    AttributeNotApplicable {
        node: NodeId,
        attribute: AttributeId,
        class: NodeClass,
    },

    #[error("type mismatch for attribute {attribute}: got {found}")]
    TypeMismatch {
        attribute: AttributeId,
        found: &'static str,
    },

    #[error("invalid index range: {0}")]
    IndexRangeInvalid(String),

    #[error("value of {0} is read-only")]
    WriteUnsupported(NodeId),

    #[error("reference source not found: {0}")]
    SourceNotFound(NodeId),

    #[error("reference target not found: {0}")]
    TargetNotFound(NodeId),

    #[error("parent node not found: {0}")]
    ParentNotFound(NodeId),

    #[error("namespace {0} is not registered")]
    UnknownNamespace(u16),

    #[error("namespace {0} is reserved and cannot be delegated")]
    NamespaceReserved(u16),

    #[error("namespace array is full, cannot register {0}")]
    NamespaceTableFull(String),

    #[error("instance handle is stale")]
    StaleHandle,

    #[error("method {0} is not executable")]
    MethodNotExecutable(NodeId),

    #[error("data source error: {message}")]
    DataSource { message: String },

    #[error("external store for namespace {namespace} failed: {message}")]
    External { namespace: u16, message: String },

    #[error("address space lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Shorthand for a data source failure.
    pub fn data_source(message: impl Into<String>) -> Self {
        Error::DataSource {
            message: message.into(),
        }
    }

    /// Shorthand for an external store failure.
    pub fn external(namespace: u16, message: impl Into<String>) -> Self {
        Error::External {
            namespace,
            message: message.into(),
        }
    }

    /// The protocol status code reported to clients for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::BAD_NODE_ID_UNKNOWN,
            Error::ReferenceNotFound { .. } => StatusCode::BAD_NOT_FOUND,
            Error::IdentifierConflict(_) => StatusCode::BAD_NODE_ID_EXISTS,
            Error::InvalidNodeClass { .. } => StatusCode::BAD_NODE_CLASS_INVALID,
            Error::AttributeImmutable { .. } => StatusCode::BAD_NOT_WRITABLE,
            Error::AttributeNotApplicable { .. } => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            Error::TypeMismatch { .. } => StatusCode::BAD_TYPE_MISMATCH,
            Error::IndexRangeInvalid(_) => StatusCode::BAD_INDEX_RANGE_INVALID,
            Error::WriteUnsupported(_) => StatusCode::BAD_NOT_WRITABLE,
            Error::SourceNotFound(_) => StatusCode::BAD_SOURCE_NODE_ID_INVALID,
            Error::TargetNotFound(_) => StatusCode::BAD_TARGET_NODE_ID_INVALID,
            Error::ParentNotFound(_) => StatusCode::BAD_PARENT_NODE_ID_INVALID,
            Error::UnknownNamespace(_) => StatusCode::BAD_NODE_ID_INVALID,
            Error::NamespaceReserved(_) => StatusCode::BAD_INVALID_ARGUMENT,
            Error::NamespaceTableFull(_) => StatusCode::BAD_OUT_OF_MEMORY,
            Error::StaleHandle => StatusCode::BAD_INVALID_ARGUMENT,
            Error::MethodNotExecutable(_) => StatusCode::BAD_NOT_EXECUTABLE,
            Error::DataSource { .. } | Error::External { .. } | Error::LockPoisoned => {
                StatusCode::BAD_INTERNAL_ERROR
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}

/// A protocol status code. The top two bits carry the severity.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    pub const BAD_INTERNAL_ERROR: StatusCode = StatusCode(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: StatusCode = StatusCode(0x8003_0000);
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    pub const BAD_INDEX_RANGE_INVALID: StatusCode = StatusCode(0x8036_0000);
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    pub const BAD_NOT_FOUND: StatusCode = StatusCode(0x803E_0000);
    pub const BAD_INVALID_ARGUMENT: StatusCode = StatusCode(0x80AB_0000);
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    pub const BAD_NOT_EXECUTABLE: StatusCode = StatusCode(0x8111_0000);
    pub const BAD_PARENT_NODE_ID_INVALID: StatusCode = StatusCode(0x805B_0000);
    pub const BAD_NODE_ID_EXISTS: StatusCode = StatusCode(0x805E_0000);
    pub const BAD_NODE_CLASS_INVALID: StatusCode = StatusCode(0x805F_0000);
    pub const BAD_SOURCE_NODE_ID_INVALID: StatusCode = StatusCode(0x8064_0000);
    pub const BAD_TARGET_NODE_ID_INVALID: StatusCode = StatusCode(0x8065_0000);

    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
