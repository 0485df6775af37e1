//! A node as held by the local store.

use std::fmt;
use std::sync::Arc;

use crate::attribute::{AttributeId, AttributeTable, NodeClass};
use crate::instance::{InstanceHandle, InstanceLifecycle};
use crate::{Error, NodeId, ReferenceEntry, ValueBackend, Variant};

/// Executes a method: `(object, inputs) -> outputs`.
pub type MethodCallback =
    Arc<dyn Fn(&NodeId, &[Variant]) -> Result<Vec<Variant>, Error> + Send + Sync>;

pub(crate) struct Node {
    pub id: NodeId,
    pub attributes: AttributeTable,
    /// Present exactly for Variable and VariableType nodes.
    pub backend: Option<ValueBackend>,
    /// In insertion order.
    pub references: Vec<ReferenceEntry>,
    pub method: Option<MethodCallback>,
    /// Only ever set on ObjectType nodes.
    pub lifecycle: Option<Arc<dyn InstanceLifecycle>>,
    pub instance: Option<InstanceHandle>,
}

impl Node {
    pub fn new(id: NodeId, attributes: AttributeTable, value: Option<Variant>) -> Self {
        Self {
            id,
            attributes,
            backend: value.map(|v| ValueBackend::Static(v.into())),
            references: Vec::new(),
            method: None,
            lifecycle: None,
            instance: None,
        }
    }

    pub fn class(&self) -> NodeClass {
        self.attributes.class()
    }

    /// Returns false when an identical entry already exists.
    pub fn add_reference(&mut self, entry: ReferenceEntry) -> bool {
        if self.references.contains(&entry) {
            return false;
        }
        self.references.push(entry);
        true
    }

    /// Returns false when no such entry exists.
    pub fn remove_reference(&mut self, entry: &ReferenceEntry) -> bool {
        let before = self.references.len();
        self.references.retain(|r| r != entry);
        self.references.len() != before
    }

    /// Drop every entry pointing at `target`, in either direction.
    pub fn remove_references_to(&mut self, target: &NodeId) {
        self.references.retain(|r| !r.points_at(target));
    }

    pub fn require_class(&self, allowed: &[NodeClass], what: &str) -> Result<(), Error> {
        if allowed.contains(&self.class()) {
            Ok(())
        } else {
            Err(Error::InvalidNodeClass {
                node: self.id.clone(),
                class: self.class(),
                reason: format!("{} requires one of {:?}", what, allowed),
            })
        }
    }

    pub fn backend(&self) -> Result<&ValueBackend, Error> {
        self.backend.as_ref().ok_or_else(|| self.no_value())
    }

    pub fn backend_mut(&mut self) -> Result<&mut ValueBackend, Error> {
        match self.backend.as_mut() {
            Some(backend) => Ok(backend),
            None => Err(Error::AttributeNotApplicable {
                node: self.id.clone(),
                attribute: AttributeId::Value,
                class: self.attributes.class(),
            }),
        }
    }

    fn no_value(&self) -> Error {
        Error::AttributeNotApplicable {
            node: self.id.clone(),
            attribute: AttributeId::Value,
            class: self.class(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("class", &self.class())
            .field("references", &self.references.len())
            .field("backend", &self.backend.as_ref().map(|b| b.kind()))
            .field("instance", &self.instance)
            .finish()
    }
}
