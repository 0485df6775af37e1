//! Well-known node ids of namespace 0.

use crate::{NodeId, Variant};

pub const OPC_UA_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

// Data types
pub const BOOLEAN: u32 = 1;
pub const SBYTE: u32 = 2;
pub const BYTE: u32 = 3;
pub const INT16: u32 = 4;
pub const UINT16: u32 = 5;
pub const INT32: u32 = 6;
pub const UINT32: u32 = 7;
pub const INT64: u32 = 8;
pub const UINT64: u32 = 9;
pub const FLOAT: u32 = 10;
pub const DOUBLE: u32 = 11;
pub const STRING: u32 = 12;
pub const DATE_TIME: u32 = 13;
pub const GUID: u32 = 14;
pub const BYTE_STRING: u32 = 15;
pub const NODE_ID: u32 = 17;
pub const QUALIFIED_NAME: u32 = 20;
pub const LOCALIZED_TEXT: u32 = 21;
pub const BASE_DATA_TYPE: u32 = 24;

// Reference types
pub const REFERENCES: u32 = 31;
pub const NON_HIERARCHICAL_REFERENCES: u32 = 32;
pub const HIERARCHICAL_REFERENCES: u32 = 33;
pub const HAS_CHILD: u32 = 34;
pub const ORGANIZES: u32 = 35;
pub const HAS_TYPE_DEFINITION: u32 = 40;
pub const HAS_SUBTYPE: u32 = 45;
pub const HAS_PROPERTY: u32 = 46;
pub const HAS_COMPONENT: u32 = 47;

// Types
pub const BASE_OBJECT_TYPE: u32 = 58;
pub const FOLDER_TYPE: u32 = 61;
pub const BASE_VARIABLE_TYPE: u32 = 62;
pub const BASE_DATA_VARIABLE_TYPE: u32 = 63;
pub const PROPERTY_TYPE: u32 = 68;

// Folders
pub const ROOT_FOLDER: u32 = 84;
pub const OBJECTS_FOLDER: u32 = 85;
pub const TYPES_FOLDER: u32 = 86;
pub const VIEWS_FOLDER: u32 = 87;
pub const OBJECT_TYPES_FOLDER: u32 = 88;
pub const VARIABLE_TYPES_FOLDER: u32 = 89;
pub const DATA_TYPES_FOLDER: u32 = 90;
pub const REFERENCE_TYPES_FOLDER: u32 = 91;

/// A namespace-0 numeric node id.
pub fn ns0(value: u32) -> NodeId {
    NodeId::numeric(0, value)
}

/// The built-in data type node for a value.
///
/// Arrays report the type of their first element; empty arrays and empty
/// variants report BaseDataType.
pub fn data_type_of(value: &Variant) -> NodeId {
    let id = match value {
        Variant::Empty => BASE_DATA_TYPE,
        Variant::Boolean(_) => BOOLEAN,
        Variant::SByte(_) => SBYTE,
        Variant::Byte(_) => BYTE,
        Variant::Int16(_) => INT16,
        Variant::UInt16(_) => UINT16,
        Variant::Int32(_) => INT32,
        Variant::UInt32(_) => UINT32,
        Variant::Int64(_) => INT64,
        Variant::UInt64(_) => UINT64,
        Variant::Float(_) => FLOAT,
        Variant::Double(_) => DOUBLE,
        Variant::String(_) => STRING,
        Variant::DateTime(_) => DATE_TIME,
        Variant::Guid(_) => GUID,
        Variant::ByteString(_) => BYTE_STRING,
        Variant::NodeId(_) => NODE_ID,
        Variant::QualifiedName(_) => QUALIFIED_NAME,
        Variant::LocalizedText(_) => LOCALIZED_TEXT,
        Variant::Array(items) => {
            return items
                .first()
                .map(data_type_of)
                .unwrap_or_else(|| ns0(BASE_DATA_TYPE))
        }
    };
    ns0(id)
}
