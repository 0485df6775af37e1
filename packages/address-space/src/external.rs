//! Federated namespaces.
//!
//! A namespace other than 0 can be handed to an [`ExternalNodeStore`]. The
//! address space then forwards every operation on a node of that namespace
//! to the store and returns its answer as-is. Nothing is merged across
//! stores here; that is the job of whoever spans namespaces.
//!
//! Every operation is batched the same way: `items` holds the requests and
//! `indices` selects which of them this store should handle. The result is
//! one entry per index, in index order. An outer `Err` means the store as a
//! whole failed.

use crate::{
    AddNodeRequest, AttributeId, AttributeValue, Error, ExpandedNodeId, NodeId, NumericRange,
    ReferenceEntry, RelativePathElement,
};

/// Outcome of a batched call: an adapter failure or one result per index.
pub type BatchResult<T> = Result<Vec<Result<T, Error>>, Error>;

#[derive(Clone, Debug, PartialEq)]
pub struct AddReferencesItem {
    pub source: NodeId,
    pub reference_type: NodeId,
    pub target: ExpandedNodeId,
    pub is_forward: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteNodesItem {
    pub node: NodeId,
    pub delete_target_references: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteReferencesItem {
    pub source: NodeId,
    pub reference_type: NodeId,
    pub target: ExpandedNodeId,
    pub is_forward: bool,
    pub delete_bidirectional: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadValueId {
    pub node: NodeId,
    pub attribute: AttributeId,
    pub range: Option<NumericRange>,
    pub want_source_timestamp: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteValue {
    pub node: NodeId,
    pub attribute: AttributeId,
    pub range: Option<NumericRange>,
    pub value: AttributeValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrowsePath {
    pub start: NodeId,
    pub elements: Vec<RelativePathElement>,
}

/// A node store that owns one or more namespaces on behalf of the server.
///
/// The store keeps its own reference bookkeeping: references into it are
/// recorded on the local side as forward-only entries.
pub trait ExternalNodeStore: Send + Sync {
    fn add_nodes(&self, items: &[AddNodeRequest], indices: &[usize]) -> BatchResult<NodeId>;

    fn add_references(&self, items: &[AddReferencesItem], indices: &[usize]) -> BatchResult<()>;

    fn delete_nodes(&self, items: &[DeleteNodesItem], indices: &[usize]) -> BatchResult<()>;

    fn delete_references(
        &self,
        items: &[DeleteReferencesItem],
        indices: &[usize],
    ) -> BatchResult<()>;

    fn read_nodes(&self, items: &[ReadValueId], indices: &[usize]) -> BatchResult<AttributeValue>;

    fn write_nodes(&self, items: &[WriteValue], indices: &[usize]) -> BatchResult<()>;

    /// All references of each requested node.
    fn browse_nodes(&self, items: &[NodeId], indices: &[usize])
        -> BatchResult<Vec<ReferenceEntry>>;

    fn translate_browse_paths(
        &self,
        items: &[BrowsePath],
        indices: &[usize],
    ) -> BatchResult<Vec<ExpandedNodeId>>;

    /// Called once when the store is unregistered or the address space is
    /// dropped.
    fn destroy(&self) {}
}

/// Forward a single request and unwrap its single result.
pub(crate) fn forward_one<I, T>(
    namespace: u16,
    item: I,
    call: impl FnOnce(&[I], &[usize]) -> BatchResult<T>,
) -> Result<T, Error> {
    call(std::slice::from_ref(&item), &[0])?
        .into_iter()
        .next()
        .unwrap_or_else(|| Err(Error::external(namespace, "store returned no result")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_one_unwraps_single_result() {
        let out = forward_one(2, 5u32, |items, indices| {
            assert_eq!(indices, &[0]);
            Ok(vec![Ok(items[0] * 2)])
        });
        assert_eq!(out, Ok(10));
    }

    #[test]
    fn forward_one_reports_missing_result() {
        let out: Result<(), Error> = forward_one(2, (), |_, _| Ok(vec![]));
        assert!(matches!(out, Err(Error::External { namespace: 2, .. })));
    }

    #[test]
    fn forward_one_propagates_adapter_failure() {
        let out: Result<(), Error> = forward_one(3, (), |_, _| Err(Error::external(3, "down")));
        assert_eq!(out, Err(Error::external(3, "down")));
    }
}
