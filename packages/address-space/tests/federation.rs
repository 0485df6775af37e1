use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use uaserver_address_space::external::{
    AddReferencesItem, BatchResult, BrowsePath, DeleteNodesItem, DeleteReferencesItem,
    ReadValueId, WriteValue,
};
use uaserver_address_space::{
    ids, AddNodeRequest, AddressSpace, AttributeId, AttributeValue, DataValue, Error,
    ExpandedNodeId, ExternalNodeStore, NodeClass, NodeId, QualifiedName, ReferenceEntry,
    ValueCallback, Variant,
};

/// A flat in-memory store for one foreign namespace.
#[derive(Default)]
struct FakeStore {
    values: Mutex<HashMap<NodeId, Variant>>,
    references: Mutex<Vec<AddReferencesItem>>,
    calls: Mutex<Vec<&'static str>>,
    destroyed: AtomicUsize,
}

impl FakeStore {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl ExternalNodeStore for FakeStore {
    fn add_nodes(&self, items: &[AddNodeRequest], indices: &[usize]) -> BatchResult<NodeId> {
        self.record("add_nodes");
        let mut values = self.values.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                let id = items[i].requested_id.clone();
                if values.contains_key(&id) {
                    return Err(Error::IdentifierConflict(id));
                }
                values.insert(id.clone(), Variant::Empty);
                Ok(id)
            })
            .collect())
    }

    fn add_references(&self, items: &[AddReferencesItem], indices: &[usize]) -> BatchResult<()> {
        self.record("add_references");
        let mut references = self.references.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                references.push(items[i].clone());
                Ok(())
            })
            .collect())
    }

    fn delete_nodes(&self, items: &[DeleteNodesItem], indices: &[usize]) -> BatchResult<()> {
        self.record("delete_nodes");
        let mut values = self.values.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                values
                    .remove(&items[i].node)
                    .map(|_| ())
                    .ok_or_else(|| Error::NotFound(items[i].node.clone()))
            })
            .collect())
    }

    fn delete_references(
        &self,
        _items: &[DeleteReferencesItem],
        indices: &[usize],
    ) -> BatchResult<()> {
        self.record("delete_references");
        Ok(indices.iter().map(|_| Ok(())).collect())
    }

    fn read_nodes(&self, items: &[ReadValueId], indices: &[usize]) -> BatchResult<AttributeValue> {
        self.record("read_nodes");
        let values = self.values.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                let item = &items[i];
                let value = values
                    .get(&item.node)
                    .ok_or_else(|| Error::NotFound(item.node.clone()))?;
                Ok(match item.attribute {
                    AttributeId::NodeClass => AttributeValue::NodeClass(NodeClass::Variable),
                    AttributeId::Value => AttributeValue::Value(DataValue::new(value.clone())),
                    other => AttributeValue::QualifiedName(QualifiedName::new(
                        item.node.namespace,
                        other.to_string(),
                    )),
                })
            })
            .collect())
    }

    fn write_nodes(&self, items: &[WriteValue], indices: &[usize]) -> BatchResult<()> {
        self.record("write_nodes");
        let mut values = self.values.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                let item = &items[i];
                match (&item.value, values.get_mut(&item.node)) {
                    (AttributeValue::Value(v), Some(slot)) => {
                        *slot = v.value.clone();
                        Ok(())
                    }
                    (_, None) => Err(Error::NotFound(item.node.clone())),
                    (other, Some(_)) => Err(Error::TypeMismatch {
                        attribute: item.attribute,
                        found: other.type_name(),
                    }),
                }
            })
            .collect())
    }

    fn browse_nodes(
        &self,
        items: &[NodeId],
        indices: &[usize],
    ) -> BatchResult<Vec<ReferenceEntry>> {
        self.record("browse_nodes");
        let references = self.references.lock().unwrap();
        Ok(indices
            .iter()
            .map(|&i| {
                Ok(references
                    .iter()
                    .filter(|r| r.source == items[i])
                    .map(|r| ReferenceEntry::forward(r.reference_type.clone(), r.target.clone()))
                    .collect())
            })
            .collect())
    }

    fn translate_browse_paths(
        &self,
        items: &[BrowsePath],
        indices: &[usize],
    ) -> BatchResult<Vec<ExpandedNodeId>> {
        self.record("translate_browse_paths");
        Ok(indices
            .iter()
            .map(|&i| Ok(vec![ExpandedNodeId::from(items[i].start.clone())]))
            .collect())
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A store whose adapter fails as a whole.
struct DownStore;

impl ExternalNodeStore for DownStore {
    fn add_nodes(&self, _: &[AddNodeRequest], _: &[usize]) -> BatchResult<NodeId> {
        Err(Error::external(2, "connection lost"))
    }

    fn add_references(&self, _: &[AddReferencesItem], _: &[usize]) -> BatchResult<()> {
        Err(Error::external(2, "connection lost"))
    }

    fn delete_nodes(&self, _: &[DeleteNodesItem], _: &[usize]) -> BatchResult<()> {
        Err(Error::external(2, "connection lost"))
    }

    fn delete_references(&self, _: &[DeleteReferencesItem], _: &[usize]) -> BatchResult<()> {
        Err(Error::external(2, "connection lost"))
    }

    fn read_nodes(&self, _: &[ReadValueId], _: &[usize]) -> BatchResult<AttributeValue> {
        Err(Error::external(2, "connection lost"))
    }

    fn write_nodes(&self, _: &[WriteValue], _: &[usize]) -> BatchResult<()> {
        Err(Error::external(2, "connection lost"))
    }

    fn browse_nodes(&self, _: &[NodeId], _: &[usize]) -> BatchResult<Vec<ReferenceEntry>> {
        Err(Error::external(2, "connection lost"))
    }

    fn translate_browse_paths(
        &self,
        _: &[BrowsePath],
        _: &[usize],
    ) -> BatchResult<Vec<ExpandedNodeId>> {
        Err(Error::external(2, "connection lost"))
    }
}

fn federated() -> (AddressSpace, Arc<FakeStore>, u16) {
    let space = AddressSpace::new("urn:uaserver:test").unwrap();
    let store = Arc::new(FakeStore::default());
    let index = space
        .add_external_namespace("urn:plant:plc", store.clone())
        .unwrap();
    (space, store, index)
}

fn variable(ns: u16, id: u32) -> AddNodeRequest {
    AddNodeRequest::new(NodeClass::Variable, QualifiedName::new(ns, "Tag")).with_id(NodeId::numeric(ns, id))
}

#[test]
fn node_operations_are_forwarded() {
    let (space, store, ns) = federated();
    assert_eq!(ns, 2);

    let id = space.add_node(variable(ns, 7)).unwrap();
    assert_eq!(id, NodeId::numeric(ns, 7));
    assert_eq!(space.node_count().unwrap(), AddressSpace::new("urn:x").unwrap().node_count().unwrap());

    space.write_value(&id, &Variant::Int32(5), None).unwrap();
    assert_eq!(
        space.read_value(&id, None, false).unwrap().value,
        Variant::Int32(5)
    );
    assert_eq!(space.get_node_class(&id).unwrap(), NodeClass::Variable);

    space.delete_node(&id).unwrap();
    assert!(!space.contains(&id).unwrap());

    assert_eq!(
        store.calls(),
        vec![
            "add_nodes",
            "write_nodes",
            "read_nodes",
            "read_nodes",
            "delete_nodes",
            "read_nodes",
        ]
    );
}

#[test]
fn per_item_errors_come_back_unchanged() {
    let (space, _store, ns) = federated();
    space.add_node(variable(ns, 1)).unwrap();
    assert_eq!(
        space.add_node(variable(ns, 1)).unwrap_err(),
        Error::IdentifierConflict(NodeId::numeric(ns, 1))
    );
    assert_eq!(
        space.delete_node(&NodeId::numeric(ns, 99)).unwrap_err(),
        Error::NotFound(NodeId::numeric(ns, 99))
    );
}

#[test]
fn adapter_failures_propagate() {
    let space = AddressSpace::new("urn:uaserver:test").unwrap();
    let ns = space
        .add_external_namespace("urn:down", Arc::new(DownStore))
        .unwrap();
    let err = space
        .get_attribute(&NodeId::numeric(ns, 1), AttributeId::BrowseName)
        .unwrap_err();
    assert_eq!(err, Error::external(2, "connection lost"));
    assert!(space.contains(&NodeId::numeric(ns, 1)).is_err());
}

#[test]
fn references_into_a_federated_namespace_are_one_sided() {
    let (space, store, ns) = federated();
    let tag = space.add_node(variable(ns, 1)).unwrap();
    let objects = ids::ns0(ids::OBJECTS_FOLDER);
    let organizes = ids::ns0(ids::ORGANIZES);

    space
        .add_reference(&objects, &organizes, tag.clone(), true)
        .unwrap();

    let mut seen = Vec::new();
    space
        .for_each_child(&objects, |child, is_inverse, _| {
            if child == &tag {
                seen.push(is_inverse);
            }
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(seen, vec![false]);
    assert!(!store.calls().contains(&"add_references"));

    // Starting from the foreign node, the store is asked instead.
    space
        .add_reference(&tag, &organizes, objects.clone(), true)
        .unwrap();
    assert_eq!(store.references.lock().unwrap().len(), 1);
    let refs = space.references(&tag).unwrap();
    assert_eq!(refs, vec![ReferenceEntry::forward(organizes, objects)]);
}

#[test]
fn local_node_under_a_federated_parent() {
    let (space, _store, ns) = federated();
    let parent = space.add_node(variable(ns, 1)).unwrap();
    let child = space
        .add_object(
            NodeId::numeric(1, 500),
            parent.clone(),
            QualifiedName::new(1, "Local"),
        )
        .unwrap();

    let refs = space.references(&child).unwrap();
    assert!(refs.contains(&ReferenceEntry::inverse(ids::ns0(ids::ORGANIZES), parent)));
}

#[test]
fn local_only_operations_reject_federated_nodes() {
    let (space, _store, ns) = federated();
    let tag = space.add_node(variable(ns, 1)).unwrap();
    let err = space
        .set_value_callback(&tag, ValueCallback::new())
        .unwrap_err();
    assert!(matches!(err, Error::External { namespace, .. } if namespace == ns));
}

#[test]
fn reserved_namespaces_cannot_be_delegated() {
    let space = AddressSpace::new("urn:uaserver:test").unwrap();
    assert_eq!(
        space
            .add_external_namespace(ids::OPC_UA_NAMESPACE_URI, Arc::new(FakeStore::default()))
            .unwrap_err(),
        Error::NamespaceReserved(0)
    );

    space
        .add_object(
            NodeId::numeric(1, 1),
            ids::ns0(ids::OBJECTS_FOLDER),
            QualifiedName::new(1, "Mine"),
        )
        .unwrap();
    assert_eq!(
        space
            .add_external_namespace("urn:uaserver:test", Arc::new(FakeStore::default()))
            .unwrap_err(),
        Error::NamespaceReserved(1)
    );
}

#[test]
fn stores_are_destroyed_exactly_once() {
    let (space, first, ns) = federated();
    let second = Arc::new(FakeStore::default());
    assert_eq!(
        space
            .add_external_namespace("urn:plant:plc", second.clone())
            .unwrap(),
        ns
    );
    assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(second.destroyed.load(Ordering::SeqCst), 0);

    space.remove_external_namespace(ns).unwrap();
    assert_eq!(second.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(
        space.remove_external_namespace(ns).unwrap_err(),
        Error::UnknownNamespace(ns)
    );

    let third = Arc::new(FakeStore::default());
    space
        .add_external_namespace("urn:plant:other", third.clone())
        .unwrap();
    drop(space);
    assert_eq!(third.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn translate_browse_path_starting_in_a_federated_namespace() {
    let (space, store, ns) = federated();
    let start = NodeId::numeric(ns, 3);
    let found = space.translate_browse_path(&start, &[]).unwrap();
    assert_eq!(found, vec![ExpandedNodeId::from(start)]);
    assert_eq!(store.calls(), vec!["translate_browse_paths"]);
}
