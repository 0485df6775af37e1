//! uaserver address space: the graph of typed nodes a server exposes.
//!
//! This crate holds the server's information model:
//! - `NodeId`, `Variant`, `DataValue`: identifiers and values
//! - `AttributeTable`: which attributes a node carries, per NodeClass
//! - `ValueBackend`: static, callback-observed or data-source values
//! - `AddressSpace`: the node store with bidirectional references,
//!   namespace federation and attribute dispatch
//!
//! # Example
//!
//! ```rust
//! use uaserver_address_space::{
//!     ids, AddressSpace, AttributeId, AttributeValue, NodeId, QualifiedName, Variant,
//! };
//!
//! let space = AddressSpace::new("urn:example").unwrap();
//! let id = space
//!     .add_variable(
//!         NodeId::numeric(1, 42),
//!         ids::ns0(ids::OBJECTS_FOLDER),
//!         QualifiedName::new(1, "Temperature"),
//!         21.5f64,
//!     )
//!     .unwrap();
//!
//! match space.get_attribute(&id, AttributeId::Value).unwrap() {
//!     AttributeValue::Value(v) => assert_eq!(v.value, Variant::Double(21.5)),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

mod address_space;
mod attribute;
mod backend;
mod dispatch;
mod error;
pub mod external;
pub mod ids;
mod instance;
mod names;
mod node;
mod node_id;
mod range;
mod reference;
mod standard;
mod store;
mod variant;

pub use address_space::{AddNodeRequest, AddressSpace, Namespace, APPLICATION_NAMESPACE};
pub use attribute::{
    access_level, AttributeId, AttributeTable, AttributeValue, NodeAttributes, NodeClass,
};
pub use backend::{
    DataSource, DataSourceRead, DataSourceWrite, ReadHook, ValueBackend, ValueBackendKind,
    ValueCallback, WriteHook,
};
pub use error::{Error, StatusCode};
pub use external::ExternalNodeStore;
pub use instance::{Instance, InstanceHandle, InstanceLifecycle};
pub use names::{LocalizedText, QualifiedName};
pub use node::MethodCallback;
pub use node_id::{ExpandedNodeId, Identifier, NodeId, NodeIdError};
pub use range::{NumericRange, RangeDimension};
pub use reference::{ReferenceEntry, RelativePathElement};
pub use variant::{DataValue, Variant};
