//! The local node store: nodes keyed by id plus their reference lists.
//!
//! Nothing here locks. [`AddressSpace`](crate::AddressSpace) wraps the store
//! in its lock and calls these methods from inside one critical section per
//! operation, so every multi-node change (linking two nodes, scrubbing a
//! deleted node out of its neighbours) is observed all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::instance::{Instance, InstanceArena, InstanceHandle, InstanceLifecycle};
use crate::node::Node;
use crate::{Error, ExpandedNodeId, Identifier, NodeId, ReferenceEntry};

#[derive(Default)]
pub(crate) struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    next_numeric: HashMap<u16, u32>,
    instances: InstanceArena,
}

impl NodeStore {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Result<&Node, Error> {
        self.nodes.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node, Error> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Whether any node lives in `namespace`.
    pub fn has_namespace(&self, namespace: u16) -> bool {
        self.nodes.keys().any(|id| id.namespace == namespace)
    }

    /// The next unused numeric id in `namespace`.
    pub fn next_free_id(&mut self, namespace: u16) -> NodeId {
        let counter = self.next_numeric.entry(namespace).or_insert(1);
        loop {
            let candidate = NodeId::numeric(namespace, *counter);
            *counter = counter.wrapping_add(1).max(1);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn insert(&mut self, node: Node) -> Result<(), Error> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::IdentifierConflict(node.id.clone()));
        }
        if let Identifier::Numeric(n) = node.id.identifier {
            // Keep auto-assigned ids clear of explicitly requested ones.
            let counter = self.next_numeric.entry(node.id.namespace).or_insert(1);
            if n == *counter {
                *counter = counter.wrapping_add(1).max(1);
            }
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Store `source -[reference_type]-> target`.
    ///
    /// `source` must exist. When `target` is a local node the inverse entry
    /// is stored on it as well; otherwise only the forward stub is kept.
    /// Returns false if the reference already existed.
    pub fn link(
        &mut self,
        source: &NodeId,
        reference_type: &NodeId,
        target: &ExpandedNodeId,
    ) -> Result<bool, Error> {
        let local_target = target.is_local_server() && self.nodes.contains_key(&target.node_id);
        let added = self
            .get_mut(source)?
            .add_reference(ReferenceEntry::forward(reference_type.clone(), target.clone()));
        if local_target {
            let node = self.get_mut(&target.node_id)?;
            node.add_reference(ReferenceEntry::inverse(
                reference_type.clone(),
                source.clone(),
            ));
        }
        Ok(added)
    }

    /// Remove `source -[reference_type]-> target`, and the inverse entry on a
    /// local target when `bidirectional` is set.
    pub fn unlink(
        &mut self,
        source: &NodeId,
        reference_type: &NodeId,
        target: &ExpandedNodeId,
        bidirectional: bool,
    ) -> Result<(), Error> {
        let entry = ReferenceEntry::forward(reference_type.clone(), target.clone());
        if !self.get_mut(source)?.remove_reference(&entry) {
            return Err(Error::ReferenceNotFound {
                node: source.clone(),
                reference_type: reference_type.clone(),
                target: target.node_id.clone(),
            });
        }
        if bidirectional && target.is_local_server() {
            if let Some(node) = self.nodes.get_mut(&target.node_id) {
                node.remove_reference(&ReferenceEntry::inverse(
                    reference_type.clone(),
                    source.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Remove a node and every entry its local neighbours hold for it.
    pub fn remove(&mut self, id: &NodeId) -> Result<Node, Error> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        for entry in &node.references {
            if !entry.target.is_local_server() {
                continue;
            }
            if let Some(neighbour) = self.nodes.get_mut(&entry.target.node_id) {
                neighbour.remove_references_to(id);
            }
        }
        Ok(node)
    }

    pub fn attach_instance(
        &mut self,
        instance: Instance,
        lifecycle: Arc<dyn InstanceLifecycle>,
    ) -> InstanceHandle {
        self.instances.insert(instance, lifecycle)
    }

    pub fn detach_instance(
        &mut self,
        handle: InstanceHandle,
    ) -> Result<(Instance, Arc<dyn InstanceLifecycle>), Error> {
        self.instances.remove(handle)
    }

    pub fn instances(&self) -> &InstanceArena {
        &self.instances
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }
}
