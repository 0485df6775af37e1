//! The standard nodes of namespace 0.
//!
//! Only the part of the standard information model the core relies on:
//! the folder skeleton, the base reference types, the built-in data types
//! and the base object and variable types.

use crate::address_space::{AddNodeRequest, Inner};
use crate::ids::*;
use crate::{Error, LocalizedText, NodeAttributes, NodeClass, QualifiedName};

struct ReferenceTypeDef {
    id: u32,
    name: &'static str,
    parent: Option<u32>,
    is_abstract: bool,
    symmetric: bool,
    inverse_name: &'static str,
}

const REFERENCE_TYPES: &[ReferenceTypeDef] = &[
    ReferenceTypeDef {
        id: REFERENCES,
        name: "References",
        parent: None,
        is_abstract: true,
        symmetric: true,
        inverse_name: "",
    },
    ReferenceTypeDef {
        id: HIERARCHICAL_REFERENCES,
        name: "HierarchicalReferences",
        parent: Some(REFERENCES),
        is_abstract: true,
        symmetric: false,
        inverse_name: "InverseHierarchicalReferences",
    },
    ReferenceTypeDef {
        id: NON_HIERARCHICAL_REFERENCES,
        name: "NonHierarchicalReferences",
        parent: Some(REFERENCES),
        is_abstract: true,
        symmetric: false,
        inverse_name: "",
    },
    ReferenceTypeDef {
        id: HAS_CHILD,
        name: "HasChild",
        parent: Some(HIERARCHICAL_REFERENCES),
        is_abstract: true,
        symmetric: false,
        inverse_name: "ChildOf",
    },
    ReferenceTypeDef {
        id: ORGANIZES,
        name: "Organizes",
        parent: Some(HIERARCHICAL_REFERENCES),
        is_abstract: false,
        symmetric: false,
        inverse_name: "OrganizedBy",
    },
    ReferenceTypeDef {
        id: HAS_SUBTYPE,
        name: "HasSubtype",
        parent: Some(HAS_CHILD),
        is_abstract: false,
        symmetric: false,
        inverse_name: "SubtypeOf",
    },
    ReferenceTypeDef {
        id: HAS_COMPONENT,
        name: "HasComponent",
        parent: Some(HAS_CHILD),
        is_abstract: false,
        symmetric: false,
        inverse_name: "ComponentOf",
    },
    ReferenceTypeDef {
        id: HAS_PROPERTY,
        name: "HasProperty",
        parent: Some(HAS_CHILD),
        is_abstract: false,
        symmetric: false,
        inverse_name: "PropertyOf",
    },
    ReferenceTypeDef {
        id: HAS_TYPE_DEFINITION,
        name: "HasTypeDefinition",
        parent: Some(NON_HIERARCHICAL_REFERENCES),
        is_abstract: false,
        symmetric: false,
        inverse_name: "TypeDefinitionOf",
    },
];

const DATA_TYPES: &[(u32, &str)] = &[
    (BOOLEAN, "Boolean"),
    (SBYTE, "SByte"),
    (BYTE, "Byte"),
    (INT16, "Int16"),
    (UINT16, "UInt16"),
    (INT32, "Int32"),
    (UINT32, "UInt32"),
    (INT64, "Int64"),
    (UINT64, "UInt64"),
    (FLOAT, "Float"),
    (DOUBLE, "Double"),
    (STRING, "String"),
    (DATE_TIME, "DateTime"),
    (GUID, "Guid"),
    (BYTE_STRING, "ByteString"),
    (NODE_ID, "NodeId"),
    (QUALIFIED_NAME, "QualifiedName"),
    (LOCALIZED_TEXT, "LocalizedText"),
];

/// (id, name, parent folder)
const FOLDERS: &[(u32, &str, Option<u32>)] = &[
    (ROOT_FOLDER, "Root", None),
    (OBJECTS_FOLDER, "Objects", Some(ROOT_FOLDER)),
    (TYPES_FOLDER, "Types", Some(ROOT_FOLDER)),
    (VIEWS_FOLDER, "Views", Some(ROOT_FOLDER)),
    (OBJECT_TYPES_FOLDER, "ObjectTypes", Some(TYPES_FOLDER)),
    (VARIABLE_TYPES_FOLDER, "VariableTypes", Some(TYPES_FOLDER)),
    (DATA_TYPES_FOLDER, "DataTypes", Some(TYPES_FOLDER)),
    (REFERENCE_TYPES_FOLDER, "ReferenceTypes", Some(TYPES_FOLDER)),
];

fn request(class: NodeClass, id: u32, name: &str) -> AddNodeRequest {
    AddNodeRequest::new(class, QualifiedName::new(0, name)).with_id(ns0(id))
}

fn subtype_of(request: AddNodeRequest, parent: Option<u32>) -> AddNodeRequest {
    match parent {
        Some(parent) => request.with_parent(ns0(parent), ns0(HAS_SUBTYPE)),
        None => request,
    }
}

/// Create the namespace-0 nodes in an empty store.
pub(crate) fn populate(inner: &mut Inner) -> Result<(), Error> {
    for def in REFERENCE_TYPES {
        let mut attributes = NodeAttributes::new()
            .is_abstract(def.is_abstract)
            .symmetric(def.symmetric);
        if !def.inverse_name.is_empty() {
            attributes = attributes.inverse_name(LocalizedText::text(def.inverse_name));
        }
        inner.add_local(
            subtype_of(request(NodeClass::ReferenceType, def.id, def.name), def.parent)
                .with_attributes(attributes),
        )?;
    }

    inner.add_local(
        request(NodeClass::DataType, BASE_DATA_TYPE, "BaseDataType")
            .with_attributes(NodeAttributes::new().is_abstract(true)),
    )?;
    for &(id, name) in DATA_TYPES {
        inner.add_local(subtype_of(
            request(NodeClass::DataType, id, name),
            Some(BASE_DATA_TYPE),
        ))?;
    }

    inner.add_local(request(
        NodeClass::ObjectType,
        BASE_OBJECT_TYPE,
        "BaseObjectType",
    ))?;
    inner.add_local(subtype_of(
        request(NodeClass::ObjectType, FOLDER_TYPE, "FolderType"),
        Some(BASE_OBJECT_TYPE),
    ))?;

    inner.add_local(
        request(NodeClass::VariableType, BASE_VARIABLE_TYPE, "BaseVariableType")
            .with_attributes(NodeAttributes::new().is_abstract(true)),
    )?;
    inner.add_local(subtype_of(
        request(
            NodeClass::VariableType,
            BASE_DATA_VARIABLE_TYPE,
            "BaseDataVariableType",
        ),
        Some(BASE_VARIABLE_TYPE),
    ))?;
    inner.add_local(subtype_of(
        request(NodeClass::VariableType, PROPERTY_TYPE, "PropertyType"),
        Some(BASE_VARIABLE_TYPE),
    ))?;

    for &(id, name, parent) in FOLDERS {
        let mut folder = request(NodeClass::Object, id, name).with_type_definition(ns0(FOLDER_TYPE));
        if let Some(parent) = parent {
            folder = folder.with_parent(ns0(parent), ns0(ORGANIZES));
        }
        inner.add_local(folder)?;
    }

    let organizes = ns0(ORGANIZES);
    for (folder, root) in [
        (OBJECT_TYPES_FOLDER, BASE_OBJECT_TYPE),
        (VARIABLE_TYPES_FOLDER, BASE_VARIABLE_TYPE),
        (DATA_TYPES_FOLDER, BASE_DATA_TYPE),
        (REFERENCE_TYPES_FOLDER, REFERENCES),
    ] {
        inner.link_checked(&ns0(folder), &organizes, &ns0(root).into())?;
    }

    Ok(())
}
