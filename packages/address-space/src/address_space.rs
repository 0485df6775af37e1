//! The address space: the local node store plus namespace routing.
//!
//! All local state sits behind one `RwLock`. Every operation takes the lock
//! once, so a node is either fully built (attributes, parent reference,
//! type definition reference, instance) or not visible at all, and linking
//! two nodes is atomic against deleting either of them.
//!
//! Operations on a node first resolve its namespace. Namespaces handed to an
//! [`ExternalNodeStore`] are forwarded to it with the lock released.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument};

use crate::external::{
    forward_one, AddReferencesItem, BrowsePath, DeleteNodesItem, DeleteReferencesItem,
    ExternalNodeStore, ReadValueId,
};
use crate::ids::{self, OPC_UA_NAMESPACE_URI};
use crate::node::Node;
use crate::store::NodeStore;
use crate::{
    AttributeId, AttributeTable, AttributeValue, Error, ExpandedNodeId, Identifier,
    NodeAttributes, NodeClass, NodeId, QualifiedName, ReferenceEntry, RelativePathElement,
    Variant,
};

/// The namespace of the application's own nodes.
pub const APPLICATION_NAMESPACE: u16 = 1;

/// Everything needed to create a node.
#[derive(Clone, Debug)]
pub struct AddNodeRequest {
    pub class: NodeClass,
    /// The null id or a numeric id of 0 asks for an auto-assigned id.
    pub requested_id: NodeId,
    /// The null id means "no parent".
    pub parent: NodeId,
    pub reference_type: NodeId,
    pub browse_name: QualifiedName,
    /// The null id means "no type definition".
    pub type_definition: NodeId,
    pub attributes: NodeAttributes,
}

impl AddNodeRequest {
    pub fn new(class: NodeClass, browse_name: QualifiedName) -> Self {
        Self {
            class,
            requested_id: NodeId::null(),
            parent: NodeId::null(),
            reference_type: NodeId::null(),
            browse_name,
            type_definition: NodeId::null(),
            attributes: NodeAttributes::default(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.requested_id = id;
        self
    }

    pub fn with_parent(mut self, parent: NodeId, reference_type: NodeId) -> Self {
        self.parent = parent;
        self.reference_type = reference_type;
        self
    }

    pub fn with_type_definition(mut self, type_definition: NodeId) -> Self {
        self.type_definition = type_definition;
        self
    }

    pub fn with_attributes(mut self, attributes: NodeAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// The namespace the new node will live in.
    pub fn namespace(&self) -> u16 {
        if self.requested_id.is_null() {
            APPLICATION_NAMESPACE
        } else {
            self.requested_id.namespace
        }
    }

    fn wants_auto_id(&self) -> bool {
        self.requested_id.identifier == Identifier::Numeric(0)
    }
}

/// Where operations on a namespace go.
#[derive(Clone)]
pub enum Namespace {
    Local,
    External(Arc<dyn ExternalNodeStore>),
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Local => write!(f, "Local"),
            Namespace::External(_) => write!(f, "External"),
        }
    }
}

pub(crate) struct Inner {
    pub store: NodeStore,
    namespaces: Vec<String>,
    external: HashMap<u16, Arc<dyn ExternalNodeStore>>,
}

impl Inner {
    pub fn resolve(&self, namespace: u16) -> Result<Namespace, Error> {
        if let Some(store) = self.external.get(&namespace) {
            return Ok(Namespace::External(Arc::clone(store)));
        }
        if (namespace as usize) < self.namespaces.len() {
            Ok(Namespace::Local)
        } else {
            Err(Error::UnknownNamespace(namespace))
        }
    }

    /// Create a node in a local namespace.
    pub fn add_local(&mut self, request: AddNodeRequest) -> Result<NodeId, Error> {
        let namespace = request.namespace();
        let id = if request.wants_auto_id() {
            self.store.next_free_id(namespace)
        } else {
            request.requested_id.clone()
        };
        if self.store.contains(&id) {
            return Err(Error::IdentifierConflict(id));
        }

        let parent = if request.parent.is_null() {
            None
        } else {
            let local = match self.resolve(request.parent.namespace) {
                Ok(Namespace::Local) => true,
                Ok(Namespace::External(_)) => false,
                Err(_) => return Err(Error::ParentNotFound(request.parent)),
            };
            if local && !self.store.contains(&request.parent) {
                return Err(Error::ParentNotFound(request.parent));
            }
            Some((request.parent, local))
        };

        let type_definition = if request.type_definition.is_null() {
            None
        } else {
            let type_definition = request.type_definition;
            match self.resolve(type_definition.namespace) {
                Ok(Namespace::Local) if !self.store.contains(&type_definition) => {
                    return Err(Error::TargetNotFound(type_definition))
                }
                Err(_) => return Err(Error::TargetNotFound(type_definition)),
                _ => {}
            }
            Some(type_definition)
        };

        let (table, value) =
            AttributeTable::build(&id, request.class, request.browse_name, request.attributes)?;
        self.store.insert(Node::new(id.clone(), table, value))?;

        match parent {
            Some((parent, true)) => {
                self.store
                    .link(&parent, &request.reference_type, &id.clone().into())?;
            }
            Some((parent, false)) => {
                self.store
                    .get_mut(&id)?
                    .add_reference(ReferenceEntry::inverse(request.reference_type, parent));
            }
            None => {}
        }

        if let Some(type_definition) = type_definition {
            self.store.link(
                &id,
                &ids::ns0(ids::HAS_TYPE_DEFINITION),
                &type_definition.clone().into(),
            )?;
            let lifecycle = self
                .store
                .get(&type_definition)
                .ok()
                .and_then(|t| t.lifecycle.clone());
            if let Some(lifecycle) = lifecycle {
                let instance = lifecycle.constructor(&id);
                let handle = self.store.attach_instance(instance, lifecycle);
                self.store.get_mut(&id)?.instance = Some(handle);
            }
        }

        Ok(id)
    }

    /// Create `source -[reference_type]-> target` between local endpoints or
    /// a forward stub to a non-local target.
    pub fn link_checked(
        &mut self,
        source: &NodeId,
        reference_type: &NodeId,
        target: &ExpandedNodeId,
    ) -> Result<(), Error> {
        if !self.store.contains(source) {
            return Err(Error::SourceNotFound(source.clone()));
        }
        if target.is_local_server() {
            match self.resolve(target.node_id.namespace) {
                Ok(Namespace::Local) if !self.store.contains(&target.node_id) => {
                    return Err(Error::TargetNotFound(target.node_id.clone()))
                }
                Err(_) => return Err(Error::TargetNotFound(target.node_id.clone())),
                _ => {}
            }
        }
        self.store.link(source, reference_type, target)?;
        Ok(())
    }
}

/// The server's address space.
///
/// Namespace 0 holds the standard nodes and is always local. Namespace 1 is
/// the application namespace, named by the application URI.
pub struct AddressSpace {
    inner: RwLock<Inner>,
}

impl AddressSpace {
    /// An address space with the standard namespace-0 nodes.
    pub fn new(application_uri: &str) -> Result<Self, Error> {
        let space = Self::empty(application_uri);
        {
            let mut inner = space.write()?;
            crate::standard::populate(&mut inner)?;
        }
        Ok(space)
    }

    /// An address space with the two base namespaces and no nodes at all.
    pub fn empty(application_uri: &str) -> Self {
        Self {
            inner: RwLock::new(Inner {
                store: NodeStore::default(),
                namespaces: vec![OPC_UA_NAMESPACE_URI.to_string(), application_uri.to_string()],
                external: HashMap::new(),
            }),
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, Error> {
        Ok(self.inner.read()?)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, Error> {
        Ok(self.inner.write()?)
    }

    // -- Namespaces --

    /// Register a namespace URI; an already known URI keeps its index.
    pub fn add_namespace(&self, uri: &str) -> Result<u16, Error> {
        let mut inner = self.write()?;
        Self::intern_namespace(&mut inner, uri)
    }

    /// Namespace indices are `u16`, so the array holds at most 65536 URIs.
    fn intern_namespace(inner: &mut Inner, uri: &str) -> Result<u16, Error> {
        if let Some(index) = inner.namespaces.iter().position(|n| n == uri) {
            return Ok(index as u16);
        }
        let index = u16::try_from(inner.namespaces.len())
            .map_err(|_| Error::NamespaceTableFull(uri.to_string()))?;
        inner.namespaces.push(uri.to_string());
        info!(index, uri, "namespace registered");
        Ok(index)
    }

    pub fn namespace_index(&self, uri: &str) -> Result<Option<u16>, Error> {
        let inner = self.read()?;
        Ok(inner
            .namespaces
            .iter()
            .position(|n| n == uri)
            .map(|i| i as u16))
    }

    /// The namespace array, indexed by namespace index.
    pub fn namespaces(&self) -> Result<Vec<String>, Error> {
        Ok(self.read()?.namespaces.clone())
    }

    pub fn resolve_namespace(&self, index: u16) -> Result<Namespace, Error> {
        self.read()?.resolve(index)
    }

    /// Hand the namespace named `uri` to an external store.
    ///
    /// Namespace 0 cannot be delegated, nor can a namespace that already has
    /// local nodes. A store previously registered for the namespace is
    /// destroyed.
    #[instrument(skip(self, store))]
    pub fn add_external_namespace(
        &self,
        uri: &str,
        store: Arc<dyn ExternalNodeStore>,
    ) -> Result<u16, Error> {
        let (index, replaced) = {
            let mut inner = self.write()?;
            let existing = inner.namespaces.iter().position(|n| n == uri);
            if let Some(index) = existing {
                let index = index as u16;
                if index == 0 || inner.store.has_namespace(index) {
                    return Err(Error::NamespaceReserved(index));
                }
            }
            let index = Self::intern_namespace(&mut inner, uri)?;
            let replaced = inner.external.insert(index, store);
            info!(index, "namespace delegated to external store");
            (index, replaced)
        };
        if let Some(old) = replaced {
            old.destroy();
        }
        Ok(index)
    }

    /// Take a namespace back from its external store and destroy the store.
    pub fn remove_external_namespace(&self, index: u16) -> Result<(), Error> {
        let store = self
            .write()?
            .external
            .remove(&index)
            .ok_or(Error::UnknownNamespace(index))?;
        store.destroy();
        info!(index, "external store removed");
        Ok(())
    }

    // -- Nodes --

    /// Create a node.
    ///
    /// The parent gets a forward reference of `reference_type` to the new
    /// node; a type definition gets a `HasTypeDefinition` reference from it.
    /// If the type definition has an instance lifecycle, its constructor runs
    /// before the node becomes visible.
    pub fn add_node(&self, request: AddNodeRequest) -> Result<NodeId, Error> {
        let namespace = request.namespace();
        let mut inner = self.write()?;
        if let Namespace::External(store) = inner.resolve(namespace)? {
            drop(inner);
            return forward_one(namespace, request, |items, indices| {
                store.add_nodes(items, indices)
            });
        }
        let class = request.class;
        let id = inner.add_local(request)?;
        debug!(node = %id, %class, "node added");
        Ok(id)
    }

    /// Add an Object under `parent` with an `Organizes` reference.
    pub fn add_object(
        &self,
        id: NodeId,
        parent: NodeId,
        browse_name: QualifiedName,
    ) -> Result<NodeId, Error> {
        self.add_node(
            AddNodeRequest::new(NodeClass::Object, browse_name)
                .with_id(id)
                .with_parent(parent, ids::ns0(ids::ORGANIZES))
                .with_type_definition(ids::ns0(ids::BASE_OBJECT_TYPE)),
        )
    }

    /// Add a Variable under `parent` with a `HasComponent` reference.
    pub fn add_variable(
        &self,
        id: NodeId,
        parent: NodeId,
        browse_name: QualifiedName,
        value: impl Into<Variant>,
    ) -> Result<NodeId, Error> {
        self.add_node(
            AddNodeRequest::new(NodeClass::Variable, browse_name)
                .with_id(id)
                .with_parent(parent, ids::ns0(ids::HAS_COMPONENT))
                .with_type_definition(ids::ns0(ids::BASE_DATA_VARIABLE_TYPE))
                .with_attributes(NodeAttributes::new().value(value)),
        )
    }

    /// Delete a node and every reference pointing at it.
    ///
    /// The node's instance destructor, if any, runs first.
    pub fn delete_node(&self, id: &NodeId) -> Result<(), Error> {
        let mut inner = self.write()?;
        if let Namespace::External(store) = inner.resolve(id.namespace)? {
            drop(inner);
            let item = DeleteNodesItem {
                node: id.clone(),
                delete_target_references: true,
            };
            return forward_one(id.namespace, item, |items, indices| {
                store.delete_nodes(items, indices)
            });
        }

        if let Some(handle) = inner.store.get(id)?.instance {
            let (instance, lifecycle) = inner.store.detach_instance(handle)?;
            lifecycle.destructor(id, instance);
        }
        inner.store.remove(id)?;
        debug!(node = %id, "node deleted");
        Ok(())
    }

    /// Add a reference. Adding an existing reference is a no-op.
    ///
    /// With `is_forward == false` the reference is stored as
    /// `target -[reference_type]-> source`.
    pub fn add_reference(
        &self,
        source: &NodeId,
        reference_type: &NodeId,
        target: impl Into<ExpandedNodeId>,
        is_forward: bool,
    ) -> Result<(), Error> {
        let target = target.into();
        let (from, to) = Self::orient(source, &target, is_forward)?;

        let mut inner = self.write()?;
        match inner.resolve(from.namespace) {
            Err(_) => return Err(Error::SourceNotFound(from)),
            Ok(Namespace::External(store)) => {
                drop(inner);
                let item = AddReferencesItem {
                    source: source.clone(),
                    reference_type: reference_type.clone(),
                    target,
                    is_forward,
                };
                return forward_one(from.namespace, item, |items, indices| {
                    store.add_references(items, indices)
                });
            }
            Ok(Namespace::Local) => {}
        }
        inner.link_checked(&from, reference_type, &to)
    }

    /// Remove a reference, and its inverse entry on a local target when
    /// `delete_bidirectional` is set.
    pub fn delete_reference(
        &self,
        source: &NodeId,
        reference_type: &NodeId,
        target: impl Into<ExpandedNodeId>,
        is_forward: bool,
        delete_bidirectional: bool,
    ) -> Result<(), Error> {
        let target = target.into();
        let (from, to) = Self::orient(source, &target, is_forward)?;

        let mut inner = self.write()?;
        match inner.resolve(from.namespace) {
            Err(_) => return Err(Error::SourceNotFound(from)),
            Ok(Namespace::External(store)) => {
                drop(inner);
                let item = DeleteReferencesItem {
                    source: source.clone(),
                    reference_type: reference_type.clone(),
                    target,
                    is_forward,
                    delete_bidirectional,
                };
                return forward_one(from.namespace, item, |items, indices| {
                    store.delete_references(items, indices)
                });
            }
            Ok(Namespace::Local) => {}
        }
        if !inner.store.contains(&from) {
            return Err(Error::SourceNotFound(from));
        }
        inner
            .store
            .unlink(&from, reference_type, &to, delete_bidirectional)
    }

    /// The stored direction of a reference: inverse requests swap roles.
    fn orient(
        source: &NodeId,
        target: &ExpandedNodeId,
        is_forward: bool,
    ) -> Result<(NodeId, ExpandedNodeId), Error> {
        if is_forward {
            Ok((source.clone(), target.clone()))
        } else if target.is_local_server() {
            Ok((target.node_id.clone(), source.clone().into()))
        } else {
            Err(Error::SourceNotFound(target.node_id.clone()))
        }
    }

    /// Visit every reference of `parent` as `(child, is_inverse, reference_type)`.
    ///
    /// The references are copied when the call starts; changes made while
    /// visiting (including by the visitor) do not affect this iteration.
    /// Within a node, references are visited in the order they were added.
    pub fn for_each_child<F>(&self, parent: &NodeId, mut visitor: F) -> Result<(), Error>
    where
        F: FnMut(&NodeId, bool, &NodeId) -> ControlFlow<()>,
    {
        let snapshot = self.references(parent)?;
        for entry in &snapshot {
            if visitor(&entry.target.node_id, entry.is_inverse, &entry.reference_type).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// All references held by `node`.
    pub fn references(&self, node: &NodeId) -> Result<Vec<ReferenceEntry>, Error> {
        let inner = self.read()?;
        match inner.resolve(node.namespace)? {
            Namespace::External(store) => {
                drop(inner);
                forward_one(node.namespace, node.clone(), |items, indices| {
                    store.browse_nodes(items, indices)
                })
            }
            Namespace::Local => Ok(inner.store.get(node)?.references.clone()),
        }
    }

    /// Follow `path` from `start`, matching each element's browse name.
    ///
    /// Walks local nodes only; a path starting in a federated namespace is
    /// resolved entirely by that namespace's store.
    pub fn translate_browse_path(
        &self,
        start: &NodeId,
        path: &[RelativePathElement],
    ) -> Result<Vec<ExpandedNodeId>, Error> {
        let inner = self.read()?;
        if let Namespace::External(store) = inner.resolve(start.namespace)? {
            drop(inner);
            let item = BrowsePath {
                start: start.clone(),
                elements: path.to_vec(),
            };
            return forward_one(start.namespace, item, |items, indices| {
                store.translate_browse_paths(items, indices)
            });
        }

        inner.store.get(start)?;
        let mut current = vec![start.clone()];
        for element in path {
            let mut next = Vec::new();
            for id in &current {
                let Ok(node) = inner.store.get(id) else {
                    continue;
                };
                for entry in node.references.iter().filter(|e| element.matches(e)) {
                    if !entry.target.is_local_server() {
                        continue;
                    }
                    let target = &entry.target.node_id;
                    let named = inner
                        .store
                        .get(target)
                        .ok()
                        .and_then(|t| t.attributes.browse_name())
                        == Some(&element.target_name);
                    if named && !next.contains(target) {
                        next.push(target.clone());
                    }
                }
            }
            current = next;
        }
        Ok(current.into_iter().map(ExpandedNodeId::from).collect())
    }

    pub fn get_node_class(&self, id: &NodeId) -> Result<NodeClass, Error> {
        let inner = self.read()?;
        match inner.resolve(id.namespace)? {
            Namespace::Local => Ok(inner.store.get(id)?.class()),
            Namespace::External(store) => {
                drop(inner);
                let item = ReadValueId {
                    node: id.clone(),
                    attribute: AttributeId::NodeClass,
                    range: None,
                    want_source_timestamp: false,
                };
                match forward_one(id.namespace, item, |items, indices| {
                    store.read_nodes(items, indices)
                })? {
                    AttributeValue::NodeClass(class) => Ok(class),
                    other => Err(Error::TypeMismatch {
                        attribute: AttributeId::NodeClass,
                        found: other.type_name(),
                    }),
                }
            }
        }
    }

    /// Whether a node exists, asking the owning store for federated ids.
    pub fn contains(&self, id: &NodeId) -> Result<bool, Error> {
        match self.get_node_class(id) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) | Err(Error::UnknownNamespace(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of nodes in the local store.
    pub fn node_count(&self) -> Result<usize, Error> {
        Ok(self.read()?.store.len())
    }

    /// Number of live instance payloads.
    pub fn instance_count(&self) -> Result<usize, Error> {
        Ok(self.read()?.store.instances().len())
    }

    /// Ids of all local nodes, in no particular order.
    pub fn node_ids(&self) -> Result<Vec<NodeId>, Error> {
        Ok(self.read()?.store.ids().cloned().collect())
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, store) in inner.external.drain() {
            store.destroy();
        }
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Ok(inner) => f
                .debug_struct("AddressSpace")
                .field("namespaces", &inner.namespaces)
                .field("nodes", &inner.store.len())
                .field("external", &inner.external.len())
                .finish(),
            Err(_) => f.debug_struct("AddressSpace").finish_non_exhaustive(),
        }
    }
}
