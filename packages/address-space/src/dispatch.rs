//! Attribute and value dispatch.
//!
//! Attribute reads and writes go through the node's attribute table, except
//! for the Value attribute, which is routed to the node's value backend.
//! User code (hooks, data sources, method callbacks) is called with the lock
//! released: the needed `Arc` is cloned out of the node first.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::address_space::Namespace;
use crate::backend::{DataSourceRead, ReadHook};
use crate::external::{forward_one, ReadValueId, WriteValue};
use crate::instance::{InstanceHandle, InstanceLifecycle};
use crate::node::MethodCallback;
use crate::{
    AddressSpace, AttributeId, AttributeValue, DataSource, DataValue, Error, NodeClass, NodeId,
    NumericRange, ValueBackend, ValueBackendKind, ValueCallback, Variant,
};

/// What a value read needs to do once the lock is released.
enum ReadPlan {
    Ready(DataValue),
    Hook(ReadHook),
    Source(DataSourceRead),
}

/// The value handed to a write: borrowed for copying or taken on success.
enum Incoming<'a> {
    Copy(&'a Variant),
    Move(&'a mut Variant),
}

impl Incoming<'_> {
    fn get(&self) -> &Variant {
        match self {
            Incoming::Copy(v) => v,
            Incoming::Move(v) => v,
        }
    }

    fn take(self) -> Variant {
        match self {
            Incoming::Copy(v) => v.clone(),
            Incoming::Move(v) => v.take(),
        }
    }
}

impl AddressSpace {
    /// Read any attribute. The Value attribute is read with a source
    /// timestamp and without an index range.
    pub fn get_attribute(
        &self,
        node: &NodeId,
        attribute: AttributeId,
    ) -> Result<AttributeValue, Error> {
        if attribute == AttributeId::Value {
            return self.read_value(node, None, true).map(AttributeValue::Value);
        }
        let inner = self.read()?;
        match inner.resolve(node.namespace)? {
            Namespace::Local => Ok(inner.store.get(node)?.attributes.get(node, attribute)?.clone()),
            Namespace::External(store) => {
                drop(inner);
                let item = ReadValueId {
                    node: node.clone(),
                    attribute,
                    range: None,
                    want_source_timestamp: false,
                };
                forward_one(node.namespace, item, |items, indices| {
                    store.read_nodes(items, indices)
                })
            }
        }
    }

    /// Write any attribute.
    ///
    /// NodeId, NodeClass and Symmetric are immutable. A Value write must
    /// carry an [`AttributeValue::Value`] and goes to [`write_value`].
    ///
    /// [`write_value`]: AddressSpace::write_value
    pub fn set_attribute(
        &self,
        node: &NodeId,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> Result<(), Error> {
        if attribute.is_immutable() {
            return Err(Error::AttributeImmutable {
                node: node.clone(),
                attribute,
            });
        }
        if attribute == AttributeId::Value {
            let found = value.type_name();
            let data = value.into_data_value().ok_or(Error::TypeMismatch {
                attribute,
                found,
            })?;
            return self.write_value(node, &data.value, None);
        }

        let mut inner = self.write()?;
        match inner.resolve(node.namespace)? {
            Namespace::Local => inner
                .store
                .get_mut(node)?
                .attributes
                .set(node, attribute, value),
            Namespace::External(store) => {
                drop(inner);
                let item = WriteValue {
                    node: node.clone(),
                    attribute,
                    range: None,
                    value,
                };
                forward_one(node.namespace, item, |items, indices| {
                    store.write_nodes(items, indices)
                })
            }
        }
    }

    /// Read the value of a Variable or VariableType.
    ///
    /// Callback backends run `on_read` before the stored value is read. Data
    /// sources are called with the range and timestamp flag; their errors
    /// are returned as-is.
    pub fn read_value(
        &self,
        node: &NodeId,
        range: Option<&NumericRange>,
        want_source_timestamp: bool,
    ) -> Result<DataValue, Error> {
        let mut hook_done = false;
        loop {
            let plan = {
                let inner = self.read()?;
                if let Namespace::External(store) = inner.resolve(node.namespace)? {
                    drop(inner);
                    return self.read_external_value(store, node, range, want_source_timestamp);
                }
                let backend = inner.store.get(node)?.backend()?;
                Self::plan_read(node, backend, range, want_source_timestamp, hook_done)?
            };

            match plan {
                ReadPlan::Ready(value) => return Ok(value),
                ReadPlan::Hook(hook) => {
                    hook(node, range);
                    hook_done = true;
                }
                ReadPlan::Source(read) => {
                    let mut value = read(node, want_source_timestamp, range)?;
                    value.server_timestamp = Some(Utc::now());
                    return Ok(value);
                }
            }
        }
    }

    fn plan_read(
        node: &NodeId,
        backend: &ValueBackend,
        range: Option<&NumericRange>,
        want_source_timestamp: bool,
        hook_done: bool,
    ) -> Result<ReadPlan, Error> {
        if let ValueBackend::Callback { callback, .. } = backend {
            if let (Some(hook), false) = (&callback.on_read, hook_done) {
                return Ok(ReadPlan::Hook(Arc::clone(hook)));
            }
        }
        match backend {
            ValueBackend::Static(stored) | ValueBackend::Callback { value: stored, .. } => {
                let value = match range {
                    Some(range) => stored.value.read_range(range)?,
                    None => stored.value.clone(),
                };
                Ok(ReadPlan::Ready(DataValue {
                    value,
                    source_timestamp: stored.source_timestamp.filter(|_| want_source_timestamp),
                    server_timestamp: Some(Utc::now()),
                }))
            }
            ValueBackend::DataSource(source) => {
                if range.is_some() && !source.supports_index_range() {
                    return Err(Error::IndexRangeInvalid(format!(
                        "data source of {} does not support index ranges",
                        node
                    )));
                }
                Ok(ReadPlan::Source(source.read_fn()))
            }
        }
    }

    fn read_external_value(
        &self,
        store: Arc<dyn crate::ExternalNodeStore>,
        node: &NodeId,
        range: Option<&NumericRange>,
        want_source_timestamp: bool,
    ) -> Result<DataValue, Error> {
        let item = ReadValueId {
            node: node.clone(),
            attribute: AttributeId::Value,
            range: range.cloned(),
            want_source_timestamp,
        };
        let found = forward_one(node.namespace, item, |items, indices| {
            store.read_nodes(items, indices)
        })?;
        let type_name = found.type_name();
        found.into_data_value().ok_or(Error::TypeMismatch {
            attribute: AttributeId::Value,
            found: type_name,
        })
    }

    /// Write a copy of `value`.
    pub fn write_value(
        &self,
        node: &NodeId,
        value: &Variant,
        range: Option<&NumericRange>,
    ) -> Result<(), Error> {
        self.write_incoming(node, Incoming::Copy(value), range)
    }

    /// Write `value` without copying it.
    ///
    /// On success `value` is left `Empty`; on failure it is untouched.
    pub fn write_value_move(
        &self,
        node: &NodeId,
        value: &mut Variant,
        range: Option<&NumericRange>,
    ) -> Result<(), Error> {
        self.write_incoming(node, Incoming::Move(value), range)
    }

    fn write_incoming(
        &self,
        node: &NodeId,
        incoming: Incoming<'_>,
        range: Option<&NumericRange>,
    ) -> Result<(), Error> {
        let mut inner = self.write()?;
        if let Namespace::External(store) = inner.resolve(node.namespace)? {
            drop(inner);
            let item = WriteValue {
                node: node.clone(),
                attribute: AttributeId::Value,
                range: range.cloned(),
                value: AttributeValue::Value(DataValue::new(incoming.get().clone())),
            };
            forward_one(node.namespace, item, |items, indices| {
                store.write_nodes(items, indices)
            })?;
            incoming.take();
            return Ok(());
        }

        let backend = inner.store.get_mut(node)?.backend_mut()?;
        let source = match backend {
            ValueBackend::DataSource(source) => source.clone(),
            ValueBackend::Static(stored) | ValueBackend::Callback { value: stored, .. } => {
                match range {
                    Some(range) => {
                        let mut updated = stored.value.clone();
                        updated.write_range(range, incoming.get().clone())?;
                        incoming.take();
                        stored.value = updated;
                    }
                    None => stored.value = incoming.take(),
                }
                stored.source_timestamp = Some(Utc::now());

                let notify = match backend {
                    ValueBackend::Callback { value, callback } => callback
                        .on_write
                        .clone()
                        .map(|hook| (hook, value.value.clone())),
                    _ => None,
                };
                drop(inner);
                if let Some((hook, written)) = notify {
                    hook(node, &written, range);
                }
                return Ok(());
            }
        };
        drop(inner);

        let write = source
            .write_fn()
            .ok_or_else(|| Error::WriteUnsupported(node.clone()))?;
        if range.is_some() && !source.supports_index_range() {
            return Err(Error::IndexRangeInvalid(format!(
                "data source of {} does not support index ranges",
                node
            )));
        }
        write(node, incoming.get(), range)?;
        incoming.take();
        Ok(())
    }

    /// Replace the value backend of a Variable or VariableType.
    pub fn set_value_backend(&self, node: &NodeId, backend: ValueBackend) -> Result<(), Error> {
        let mut inner = self.local_write(node)?;
        let target = inner.store.get_mut(node)?;
        target.require_class(
            &[NodeClass::Variable, NodeClass::VariableType],
            "a value backend",
        )?;
        debug!(node = %node, kind = ?backend.kind(), "value backend set");
        target.backend = Some(backend);
        Ok(())
    }

    /// Attach observer hooks to the node's server-held value.
    ///
    /// Fails with `InvalidNodeClass` when the node is backed by a data
    /// source, since there is no server-held value to observe.
    pub fn set_value_callback(&self, node: &NodeId, callback: ValueCallback) -> Result<(), Error> {
        let mut inner = self.local_write(node)?;
        let target = inner.store.get_mut(node)?;
        target.require_class(
            &[NodeClass::Variable, NodeClass::VariableType],
            "a value callback",
        )?;
        let class = target.class();
        let value = match target.backend_mut()? {
            ValueBackend::Static(value) | ValueBackend::Callback { value, .. } => {
                std::mem::take(value)
            }
            ValueBackend::DataSource(_) => {
                return Err(Error::InvalidNodeClass {
                    node: node.clone(),
                    class,
                    reason: "value is provided by a data source".to_string(),
                })
            }
        };
        target.backend = Some(ValueBackend::Callback { value, callback });
        Ok(())
    }

    /// Replace the node's value with a data source.
    pub fn set_data_source(&self, node: &NodeId, source: DataSource) -> Result<(), Error> {
        self.set_value_backend(node, ValueBackend::DataSource(source))
    }

    pub fn value_backend_kind(&self, node: &NodeId) -> Result<ValueBackendKind, Error> {
        let inner = self.local_read(node)?;
        Ok(inner.store.get(node)?.backend()?.kind())
    }

    /// Set the function that runs when `method` is called.
    pub fn set_method_callback<F>(&self, method: &NodeId, callback: F) -> Result<(), Error>
    where
        F: Fn(&NodeId, &[Variant]) -> Result<Vec<Variant>, Error> + Send + Sync + 'static,
    {
        let mut inner = self.local_write(method)?;
        let target = inner.store.get_mut(method)?;
        target.require_class(&[NodeClass::Method], "a method callback")?;
        target.method = Some(Arc::new(callback) as MethodCallback);
        Ok(())
    }

    /// Call `method` on `object`.
    pub fn call_method(
        &self,
        object: &NodeId,
        method: &NodeId,
        inputs: &[Variant],
    ) -> Result<Vec<Variant>, Error> {
        let callback = {
            let inner = self.local_read(method)?;
            let target = inner.store.get(method)?;
            target.require_class(&[NodeClass::Method], "a call")?;
            if let Namespace::Local = inner.resolve(object.namespace)? {
                inner.store.get(object)?;
            }
            let executable = target.attributes.bool(AttributeId::Executable) == Some(true);
            match (&target.method, executable) {
                (Some(callback), true) => Arc::clone(callback),
                _ => return Err(Error::MethodNotExecutable(method.clone())),
            }
        };
        callback(object, inputs)
    }

    /// Register the instance constructor/destructor of an ObjectType.
    ///
    /// Only objects created after registration get an instance.
    pub fn set_instance_lifecycle(
        &self,
        object_type: &NodeId,
        lifecycle: Arc<dyn InstanceLifecycle>,
    ) -> Result<(), Error> {
        let mut inner = self.local_write(object_type)?;
        let target = inner.store.get_mut(object_type)?;
        target.require_class(&[NodeClass::ObjectType], "an instance lifecycle")?;
        target.lifecycle = Some(lifecycle);
        Ok(())
    }

    /// The instance handle of a node, if its type manages instances.
    pub fn instance_handle(&self, node: &NodeId) -> Result<Option<InstanceHandle>, Error> {
        let inner = self.local_read(node)?;
        Ok(inner.store.get(node)?.instance)
    }

    /// Run `f` on the payload behind `handle`.
    ///
    /// The address space is read-locked while `f` runs; `f` must not call
    /// back into it.
    pub fn with_instance<R>(
        &self,
        handle: InstanceHandle,
        f: impl FnOnce(&(dyn Any + Send + Sync)) -> R,
    ) -> Result<R, Error> {
        let inner = self.read()?;
        let instance = inner.store.instances().get(handle)?;
        Ok(f(instance))
    }

    fn local_read(
        &self,
        node: &NodeId,
    ) -> Result<std::sync::RwLockReadGuard<'_, crate::address_space::Inner>, Error> {
        let inner = self.read()?;
        match inner.resolve(node.namespace)? {
            Namespace::Local => Ok(inner),
            Namespace::External(_) => Err(not_local(node)),
        }
    }

    fn local_write(
        &self,
        node: &NodeId,
    ) -> Result<std::sync::RwLockWriteGuard<'_, crate::address_space::Inner>, Error> {
        let inner = self.write()?;
        match inner.resolve(node.namespace)? {
            Namespace::Local => Ok(inner),
            Namespace::External(_) => Err(not_local(node)),
        }
    }
}

fn not_local(node: &NodeId) -> Error {
    Error::external(
        node.namespace,
        format!("{} is owned by an external store", node),
    )
}
