use std::collections::HashSet;

use proptest::prelude::*;
use uaserver_address_space::{
    ids, AddNodeRequest, AddressSpace, NodeClass, NodeId, QualifiedName,
};

#[derive(Clone, Debug)]
enum Op {
    Auto,
    Explicit(u32),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Auto),
        2 => (1u32..20).prop_map(Op::Explicit),
        1 => any::<usize>().prop_map(Op::Delete),
    ]
}

proptest! {
    /// Whatever mix of explicit ids, auto ids and deletes, every live node has
    /// a distinct id and auto-assignment never reuses a live one.
    #[test]
    fn ids_stay_unique(ops in prop::collection::vec(op(), 1..60)) {
        let space = AddressSpace::new("urn:prop").unwrap();
        let objects = ids::ns0(ids::OBJECTS_FOLDER);
        let mut live: Vec<NodeId> = Vec::new();

        for op in ops {
            match op {
                Op::Auto => {
                    let id = space
                        .add_node(
                            AddNodeRequest::new(NodeClass::Object, QualifiedName::new(1, "N"))
                                .with_parent(objects.clone(), ids::ns0(ids::ORGANIZES)),
                        )
                        .unwrap();
                    prop_assert!(!live.contains(&id));
                    live.push(id);
                }
                Op::Explicit(n) => {
                    let id = NodeId::numeric(1, n);
                    let result = space.add_object(id.clone(), objects.clone(), QualifiedName::new(1, "E"));
                    prop_assert_eq!(result.is_ok(), !live.contains(&id));
                    if result.is_ok() {
                        live.push(id);
                    }
                }
                Op::Delete(i) if !live.is_empty() => {
                    let id = live.remove(i % live.len());
                    space.delete_node(&id).unwrap();
                }
                Op::Delete(_) => {}
            }
        }

        let ns1: HashSet<NodeId> = space
            .node_ids()
            .unwrap()
            .into_iter()
            .filter(|id| id.namespace == 1)
            .collect();
        prop_assert_eq!(ns1, live.into_iter().collect::<HashSet<_>>());
    }

    /// Every forward reference between local nodes has its inverse twin.
    #[test]
    fn references_stay_paired(links in prop::collection::vec((0usize..6, 0usize..6, any::<bool>()), 0..30)) {
        let space = AddressSpace::new("urn:prop").unwrap();
        let objects = ids::ns0(ids::OBJECTS_FOLDER);
        let nodes: Vec<NodeId> = (0..6)
            .map(|i| {
                space
                    .add_object(NodeId::numeric(1, 100 + i), objects.clone(), QualifiedName::new(1, "P"))
                    .unwrap()
            })
            .collect();
        let organizes = ids::ns0(ids::ORGANIZES);

        for (a, b, add) in links {
            if add {
                space.add_reference(&nodes[a], &organizes, nodes[b].clone(), true).unwrap();
            } else {
                let _ = space.delete_reference(&nodes[a], &organizes, nodes[b].clone(), true, true);
            }
        }

        for node in &nodes {
            for entry in space.references(node).unwrap() {
                let twin = space
                    .references(&entry.target.node_id)
                    .unwrap()
                    .into_iter()
                    .any(|e| e.reference_type == entry.reference_type
                        && e.target.node_id == *node
                        && e.is_inverse != entry.is_inverse);
                prop_assert!(twin, "{:?} of {} has no twin", entry, node);
            }
        }
    }
}
