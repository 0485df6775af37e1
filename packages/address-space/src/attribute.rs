//! Node classes, attribute ids and the per-node attribute table.
//!
//! Which attributes a node carries is decided once, from its NodeClass, when
//! the node is created. Attributes that do not apply to the class are absent
//! from the table rather than default-valued, so reading them fails.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids;
use crate::{DataValue, Error, LocalizedText, NodeId, QualifiedName, Variant};

/// The fixed category of a node.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeClass {
    Object = 1,
    Variable = 2,
    Method = 4,
    ObjectType = 8,
    VariableType = 16,
    ReferenceType = 32,
    DataType = 64,
    View = 128,
}

impl NodeClass {
    /// Only variables and variable types carry a value.
    pub fn has_value(self) -> bool {
        matches!(self, NodeClass::Variable | NodeClass::VariableType)
    }

    /// Type nodes: instances may point at them with HasTypeDefinition.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            NodeClass::ObjectType
                | NodeClass::VariableType
                | NodeClass::ReferenceType
                | NodeClass::DataType
        )
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Attribute identifiers, numbered as on the wire.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeId {
    NodeId = 1,
    NodeClass = 2,
    BrowseName = 3,
    DisplayName = 4,
    Description = 5,
    WriteMask = 6,
    UserWriteMask = 7,
    IsAbstract = 8,
    Symmetric = 9,
    InverseName = 10,
    ContainsNoLoops = 11,
    EventNotifier = 12,
    Value = 13,
    DataType = 14,
    ValueRank = 15,
    ArrayDimensions = 16,
    AccessLevel = 17,
    UserAccessLevel = 18,
    MinimumSamplingInterval = 19,
    Historizing = 20,
    Executable = 21,
    UserExecutable = 22,
}

impl AttributeId {
    /// Look up an attribute by its wire number.
    pub fn from_u32(value: u32) -> Option<Self> {
        use AttributeId::*;
        Some(match value {
            1 => NodeId,
            2 => NodeClass,
            3 => BrowseName,
            4 => DisplayName,
            5 => Description,
            6 => WriteMask,
            7 => UserWriteMask,
            8 => IsAbstract,
            9 => Symmetric,
            10 => InverseName,
            11 => ContainsNoLoops,
            12 => EventNotifier,
            13 => Value,
            14 => DataType,
            15 => ValueRank,
            16 => ArrayDimensions,
            17 => AccessLevel,
            18 => UserAccessLevel,
            19 => MinimumSamplingInterval,
            20 => Historizing,
            21 => Executable,
            22 => UserExecutable,
            _ => return None,
        })
    }

    /// NodeId, NodeClass and Symmetric are fixed at creation.
    pub fn is_immutable(self) -> bool {
        matches!(
            self,
            AttributeId::NodeId | AttributeId::NodeClass | AttributeId::Symmetric
        )
    }

    /// Whether nodes of `class` carry this attribute.
    ///
    /// The user-rights attributes and Historizing are never carried: rights
    /// are enforced above the core and historizing is not supported.
    pub fn applies_to(self, class: NodeClass) -> bool {
        use AttributeId as A;
        use NodeClass as C;
        match self {
            A::NodeId | A::NodeClass | A::BrowseName | A::DisplayName | A::Description
            | A::WriteMask => true,
            A::UserWriteMask | A::UserAccessLevel | A::UserExecutable | A::Historizing => false,
            A::IsAbstract => matches!(
                class,
                C::ObjectType | C::VariableType | C::ReferenceType | C::DataType
            ),
            A::Symmetric | A::InverseName => class == C::ReferenceType,
            A::ContainsNoLoops => class == C::View,
            A::EventNotifier => matches!(class, C::Object | C::View),
            A::Value | A::DataType | A::ValueRank | A::ArrayDimensions => class.has_value(),
            A::AccessLevel | A::MinimumSamplingInterval => class == C::Variable,
            A::Executable => class == C::Method,
        }
    }

    /// Whether `value` has the type this attribute stores.
    pub fn accepts(self, value: &AttributeValue) -> bool {
        use AttributeId as A;
        use AttributeValue as V;
        matches!(
            (self, value),
            (A::NodeId, V::NodeId(_))
                | (A::NodeClass, V::NodeClass(_))
                | (A::BrowseName, V::QualifiedName(_))
                | (A::DisplayName | A::Description | A::InverseName, V::LocalizedText(_))
                | (A::WriteMask, V::UInt32(_))
                | (
                    A::IsAbstract | A::Symmetric | A::ContainsNoLoops | A::Executable,
                    V::Boolean(_)
                )
                | (A::EventNotifier | A::AccessLevel, V::Byte(_))
                | (A::Value, V::Value(_))
                | (A::DataType, V::NodeId(_))
                | (A::ValueRank, V::Int32(_))
                | (A::ArrayDimensions, V::Dimensions(_))
                | (A::MinimumSamplingInterval, V::Double(_))
        )
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    NodeId(NodeId),
    NodeClass(NodeClass),
    QualifiedName(QualifiedName),
    LocalizedText(LocalizedText),
    Boolean(bool),
    Byte(u8),
    Int32(i32),
    UInt32(u32),
    Double(f64),
    Dimensions(Vec<u32>),
    Value(DataValue),
}

impl AttributeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::NodeId(_) => "NodeId",
            AttributeValue::NodeClass(_) => "NodeClass",
            AttributeValue::QualifiedName(_) => "QualifiedName",
            AttributeValue::LocalizedText(_) => "LocalizedText",
            AttributeValue::Boolean(_) => "Boolean",
            AttributeValue::Byte(_) => "Byte",
            AttributeValue::Int32(_) => "Int32",
            AttributeValue::UInt32(_) => "UInt32",
            AttributeValue::Double(_) => "Double",
            AttributeValue::Dimensions(_) => "Dimensions",
            AttributeValue::Value(_) => "Value",
        }
    }

    /// Unwrap a Value attribute.
    pub fn into_data_value(self) -> Option<DataValue> {
        match self {
            AttributeValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Access level bits.
pub mod access_level {
    pub const CURRENT_READ: u8 = 0x01;
    pub const CURRENT_WRITE: u8 = 0x02;
}

/// Optional attributes supplied when a node is created.
///
/// Unset fields that apply to the node's class get a default; setting a
/// field that does not apply to the class makes node creation fail with
/// `InvalidNodeClass`.
#[derive(Clone, Debug, Default)]
pub struct NodeAttributes {
    pub display_name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub write_mask: Option<u32>,
    pub is_abstract: Option<bool>,
    pub symmetric: Option<bool>,
    pub inverse_name: Option<LocalizedText>,
    pub contains_no_loops: Option<bool>,
    pub event_notifier: Option<u8>,
    pub value: Option<Variant>,
    pub data_type: Option<NodeId>,
    pub value_rank: Option<i32>,
    pub array_dimensions: Option<Vec<u32>>,
    pub access_level: Option<u8>,
    pub minimum_sampling_interval: Option<f64>,
    pub executable: Option<bool>,
}

impl NodeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, text: impl Into<LocalizedText>) -> Self {
        self.display_name = Some(text.into());
        self
    }

    pub fn description(mut self, text: impl Into<LocalizedText>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn value(mut self, value: impl Into<Variant>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn data_type(mut self, data_type: NodeId) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn is_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = Some(is_abstract);
        self
    }

    pub fn symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = Some(symmetric);
        self
    }

    pub fn inverse_name(mut self, text: impl Into<LocalizedText>) -> Self {
        self.inverse_name = Some(text.into());
        self
    }

    pub fn access_level(mut self, level: u8) -> Self {
        self.access_level = Some(level);
        self
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn event_notifier(mut self, notifier: u8) -> Self {
        self.event_notifier = Some(notifier);
        self
    }

    /// The attributes that were explicitly supplied, in attribute order.
    fn supplied(&self) -> Vec<AttributeId> {
        let mut ids = Vec::new();
        let mut push = |set: bool, id: AttributeId| {
            if set {
                ids.push(id);
            }
        };
        push(self.display_name.is_some(), AttributeId::DisplayName);
        push(self.description.is_some(), AttributeId::Description);
        push(self.write_mask.is_some(), AttributeId::WriteMask);
        push(self.is_abstract.is_some(), AttributeId::IsAbstract);
        push(self.symmetric.is_some(), AttributeId::Symmetric);
        push(self.inverse_name.is_some(), AttributeId::InverseName);
        push(self.contains_no_loops.is_some(), AttributeId::ContainsNoLoops);
        push(self.event_notifier.is_some(), AttributeId::EventNotifier);
        push(self.value.is_some(), AttributeId::Value);
        push(self.data_type.is_some(), AttributeId::DataType);
        push(self.value_rank.is_some(), AttributeId::ValueRank);
        push(self.array_dimensions.is_some(), AttributeId::ArrayDimensions);
        push(self.access_level.is_some(), AttributeId::AccessLevel);
        push(
            self.minimum_sampling_interval.is_some(),
            AttributeId::MinimumSamplingInterval,
        );
        push(self.executable.is_some(), AttributeId::Executable);
        ids
    }
}

/// The attributes of one node, minus its value.
///
/// The Value attribute lives in the node's value backend; every other
/// applicable attribute is stored here.
#[derive(Clone, Debug)]
pub struct AttributeTable {
    class: NodeClass,
    values: BTreeMap<AttributeId, AttributeValue>,
}

impl AttributeTable {
    /// Build the table for a new node.
    ///
    /// Returns the table and the initial value (for value-carrying classes).
    pub fn build(
        id: &NodeId,
        class: NodeClass,
        browse_name: QualifiedName,
        attrs: NodeAttributes,
    ) -> Result<(Self, Option<Variant>), Error> {
        if let Some(bad) = attrs.supplied().into_iter().find(|a| !a.applies_to(class)) {
            return Err(Error::InvalidNodeClass {
                node: id.clone(),
                class,
                reason: format!("attribute {} does not apply", bad),
            });
        }

        let mut values = BTreeMap::new();
        let mut put = |attr: AttributeId, value: AttributeValue| {
            if attr.applies_to(class) {
                values.insert(attr, value);
            }
        };

        put(AttributeId::NodeId, AttributeValue::NodeId(id.clone()));
        put(AttributeId::NodeClass, AttributeValue::NodeClass(class));
        put(
            AttributeId::DisplayName,
            AttributeValue::LocalizedText(
                attrs
                    .display_name
                    .unwrap_or_else(|| LocalizedText::from(&browse_name)),
            ),
        );
        put(
            AttributeId::BrowseName,
            AttributeValue::QualifiedName(browse_name),
        );
        put(
            AttributeId::Description,
            AttributeValue::LocalizedText(attrs.description.unwrap_or_default()),
        );
        put(
            AttributeId::WriteMask,
            AttributeValue::UInt32(attrs.write_mask.unwrap_or(0)),
        );
        put(
            AttributeId::IsAbstract,
            AttributeValue::Boolean(attrs.is_abstract.unwrap_or(false)),
        );
        put(
            AttributeId::Symmetric,
            AttributeValue::Boolean(attrs.symmetric.unwrap_or(false)),
        );
        put(
            AttributeId::InverseName,
            AttributeValue::LocalizedText(attrs.inverse_name.unwrap_or_default()),
        );
        put(
            AttributeId::ContainsNoLoops,
            AttributeValue::Boolean(attrs.contains_no_loops.unwrap_or(false)),
        );
        put(
            AttributeId::EventNotifier,
            AttributeValue::Byte(attrs.event_notifier.unwrap_or(0)),
        );

        let value = if class.has_value() {
            Some(attrs.value.unwrap_or_default())
        } else {
            None
        };
        if let Some(value) = &value {
            let data_type = attrs
                .data_type
                .unwrap_or_else(|| ids::data_type_of(value));
            let value_rank = attrs.value_rank.unwrap_or(if value.is_empty() {
                -2
            } else {
                value.value_rank()
            });
            put(AttributeId::DataType, AttributeValue::NodeId(data_type));
            put(AttributeId::ValueRank, AttributeValue::Int32(value_rank));
            put(
                AttributeId::ArrayDimensions,
                AttributeValue::Dimensions(attrs.array_dimensions.unwrap_or_default()),
            );
        }
        put(
            AttributeId::AccessLevel,
            AttributeValue::Byte(
                attrs
                    .access_level
                    .unwrap_or(access_level::CURRENT_READ | access_level::CURRENT_WRITE),
            ),
        );
        put(
            AttributeId::MinimumSamplingInterval,
            AttributeValue::Double(attrs.minimum_sampling_interval.unwrap_or(0.0)),
        );
        put(
            AttributeId::Executable,
            AttributeValue::Boolean(attrs.executable.unwrap_or(true)),
        );

        Ok((Self { class, values }, value))
    }

    pub fn class(&self) -> NodeClass {
        self.class
    }

    /// Read an attribute other than Value.
    pub fn get(&self, id: &NodeId, attr: AttributeId) -> Result<&AttributeValue, Error> {
        self.values
            .get(&attr)
            .ok_or_else(|| Error::AttributeNotApplicable {
                node: id.clone(),
                attribute: attr,
                class: self.class,
            })
    }

    /// Overwrite an attribute other than Value.
    ///
    /// Immutable attributes, attributes the class does not carry and values
    /// of the wrong type are rejected and leave the table unchanged.
    pub fn set(
        &mut self,
        id: &NodeId,
        attr: AttributeId,
        value: AttributeValue,
    ) -> Result<(), Error> {
        if attr.is_immutable() {
            return Err(Error::AttributeImmutable {
                node: id.clone(),
                attribute: attr,
            });
        }
        if !attr.applies_to(self.class) || attr == AttributeId::Value {
            return Err(Error::AttributeNotApplicable {
                node: id.clone(),
                attribute: attr,
                class: self.class,
            });
        }
        if !attr.accepts(&value) {
            return Err(Error::TypeMismatch {
                attribute: attr,
                found: value.type_name(),
            });
        }
        self.values.insert(attr, value);
        Ok(())
    }

    pub fn browse_name(&self) -> Option<&QualifiedName> {
        match self.values.get(&AttributeId::BrowseName) {
            Some(AttributeValue::QualifiedName(name)) => Some(name),
            _ => None,
        }
    }

    pub fn bool(&self, attr: AttributeId) -> Option<bool> {
        match self.values.get(&attr) {
            Some(AttributeValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Attribute ids present in this table (Value excluded).
    pub fn ids(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.values.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(class: NodeClass, attrs: NodeAttributes) -> Result<AttributeTable, Error> {
        AttributeTable::build(
            &NodeId::numeric(1, 1),
            class,
            QualifiedName::new(1, "n"),
            attrs,
        )
        .map(|(t, _)| t)
    }

    #[test]
    fn object_has_no_value_attributes() {
        let table = build(NodeClass::Object, NodeAttributes::new()).unwrap();
        let ids: Vec<_> = table.ids().collect();
        assert!(ids.contains(&AttributeId::EventNotifier));
        assert!(!ids.contains(&AttributeId::DataType));
        assert!(!ids.contains(&AttributeId::Symmetric));
        assert!(matches!(
            table.get(&NodeId::numeric(1, 1), AttributeId::ValueRank),
            Err(Error::AttributeNotApplicable { .. })
        ));
    }

    #[test]
    fn inapplicable_supplied_attribute_is_rejected() {
        let err = build(NodeClass::Object, NodeAttributes::new().value(5)).unwrap_err();
        assert!(matches!(err, Error::InvalidNodeClass { .. }));

        let err = build(NodeClass::Variable, NodeAttributes::new().symmetric(true)).unwrap_err();
        assert!(matches!(err, Error::InvalidNodeClass { .. }));
    }

    #[test]
    fn variable_defaults_follow_value() {
        let (table, value) = AttributeTable::build(
            &NodeId::numeric(1, 1),
            NodeClass::Variable,
            QualifiedName::new(1, "v"),
            NodeAttributes::new().value(vec![1.0f64, 2.0]),
        )
        .unwrap();
        let id = NodeId::numeric(1, 1);
        assert_eq!(value, Some(Variant::from(vec![1.0f64, 2.0])));
        assert_eq!(
            table.get(&id, AttributeId::DataType).unwrap(),
            &AttributeValue::NodeId(ids::ns0(ids::DOUBLE))
        );
        assert_eq!(
            table.get(&id, AttributeId::ValueRank).unwrap(),
            &AttributeValue::Int32(1)
        );
        assert_eq!(
            table.get(&id, AttributeId::DisplayName).unwrap(),
            &AttributeValue::LocalizedText(LocalizedText::text("v"))
        );
    }

    #[test]
    fn immutable_attributes_cannot_be_set() {
        let mut table = build(NodeClass::ReferenceType, NodeAttributes::new()).unwrap();
        let id = NodeId::numeric(1, 1);
        for attr in [
            AttributeId::NodeId,
            AttributeId::NodeClass,
            AttributeId::Symmetric,
        ] {
            let err = table
                .set(&id, attr, AttributeValue::Boolean(true))
                .unwrap_err();
            assert!(matches!(err, Error::AttributeImmutable { .. }));
        }
        assert_eq!(table.bool(AttributeId::Symmetric), Some(false));
    }

    #[test]
    fn set_checks_type() {
        let mut table = build(NodeClass::Object, NodeAttributes::new()).unwrap();
        let id = NodeId::numeric(1, 1);
        let err = table
            .set(&id, AttributeId::DisplayName, AttributeValue::Boolean(true))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        table
            .set(
                &id,
                AttributeId::DisplayName,
                AttributeValue::LocalizedText("Pump".into()),
            )
            .unwrap();
        assert_eq!(
            table.get(&id, AttributeId::DisplayName).unwrap(),
            &AttributeValue::LocalizedText("Pump".into())
        );
    }

    #[test]
    fn user_attributes_never_apply() {
        for class in [NodeClass::Variable, NodeClass::Method, NodeClass::Object] {
            assert!(!AttributeId::UserAccessLevel.applies_to(class));
            assert!(!AttributeId::UserExecutable.applies_to(class));
            assert!(!AttributeId::Historizing.applies_to(class));
        }
    }

    #[test]
    fn attribute_id_from_u32() {
        assert_eq!(AttributeId::from_u32(13), Some(AttributeId::Value));
        assert_eq!(AttributeId::from_u32(0), None);
        assert_eq!(AttributeId::from_u32(23), None);
    }
}
