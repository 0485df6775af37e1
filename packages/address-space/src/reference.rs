//! References between nodes.

use crate::{ExpandedNodeId, NodeId, QualifiedName};

/// One end of a reference as stored on a node.
///
/// A reference `A -[type]-> B` between two local nodes is stored twice: as a
/// forward entry on `A` targeting `B` and as an inverse entry on `B`
/// targeting `A`. When `B` lives in a federated namespace or on another
/// server only the forward entry exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceEntry {
    pub reference_type: NodeId,
    pub target: ExpandedNodeId,
    pub is_inverse: bool,
}

impl ReferenceEntry {
    pub fn forward(reference_type: NodeId, target: impl Into<ExpandedNodeId>) -> Self {
        Self {
            reference_type,
            target: target.into(),
            is_inverse: false,
        }
    }

    pub fn inverse(reference_type: NodeId, target: impl Into<ExpandedNodeId>) -> Self {
        Self {
            reference_type,
            target: target.into(),
            is_inverse: true,
        }
    }

    /// Whether this entry points at `node` on this server.
    pub fn points_at(&self, node: &NodeId) -> bool {
        self.target.is_local_server() && &self.target.node_id == node
    }
}

/// One step of a relative browse path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativePathElement {
    /// `None` follows references of any type.
    pub reference_type: Option<NodeId>,
    pub is_inverse: bool,
    pub target_name: QualifiedName,
}

impl RelativePathElement {
    /// Follow a forward reference of any type to a node named `target_name`.
    pub fn child(target_name: QualifiedName) -> Self {
        Self {
            reference_type: None,
            is_inverse: false,
            target_name,
        }
    }

    pub fn with_reference_type(mut self, reference_type: NodeId) -> Self {
        self.reference_type = Some(reference_type);
        self
    }

    pub fn matches(&self, entry: &ReferenceEntry) -> bool {
        entry.is_inverse == self.is_inverse
            && self
                .reference_type
                .as_ref()
                .map_or(true, |t| t == &entry.reference_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_at_ignores_remote_servers() {
        let local = ReferenceEntry::forward(NodeId::numeric(0, 35), NodeId::numeric(1, 5));
        assert!(local.points_at(&NodeId::numeric(1, 5)));

        let mut remote = local.clone();
        remote.target.server_index = 3;
        assert!(!remote.points_at(&NodeId::numeric(1, 5)));
    }

    #[test]
    fn path_element_matching() {
        let organizes = NodeId::numeric(0, 35);
        let entry = ReferenceEntry::forward(organizes.clone(), NodeId::numeric(1, 1));
        let any = RelativePathElement::child(QualifiedName::new(1, "x"));
        assert!(any.matches(&entry));
        assert!(any
            .clone()
            .with_reference_type(organizes)
            .matches(&entry));
        assert!(!any
            .clone()
            .with_reference_type(NodeId::numeric(0, 47))
            .matches(&entry));

        let inverse = ReferenceEntry::inverse(NodeId::numeric(0, 35), NodeId::numeric(1, 1));
        assert!(!any.matches(&inverse));
    }
}
