//! The Variant type - the value carried by Variable nodes.
//!
//! A Variant is a closed union over the built-in scalar types plus
//! one-dimensional arrays of Variants. A DataValue wraps a Variant together
//! with its timestamps.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, LocalizedText, NodeId, NumericRange, QualifiedName};

/// A dynamically typed value.
///
/// `Empty` is both "no value" and the state a Variant is left in after its
/// contents were moved out with [`Variant::take`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    ByteString(Vec<u8>),
    NodeId(Box<NodeId>),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    Array(Vec<Variant>),
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Scalars are everything that is not an array.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Variant::Array(_))
    }

    /// Move the contents out, leaving `Empty` behind.
    pub fn take(&mut self) -> Variant {
        std::mem::take(self)
    }

    /// Number of elements for arrays and byte strings.
    pub fn len(&self) -> Option<usize> {
        match self {
            Variant::Array(items) => Some(items.len()),
            Variant::ByteString(bytes) => Some(bytes.len()),
            _ => None,
        }
    }

    /// Name of the built-in type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Empty => "Empty",
            Variant::Boolean(_) => "Boolean",
            Variant::SByte(_) => "SByte",
            Variant::Byte(_) => "Byte",
            Variant::Int16(_) => "Int16",
            Variant::UInt16(_) => "UInt16",
            Variant::Int32(_) => "Int32",
            Variant::UInt32(_) => "UInt32",
            Variant::Int64(_) => "Int64",
            Variant::UInt64(_) => "UInt64",
            Variant::Float(_) => "Float",
            Variant::Double(_) => "Double",
            Variant::String(_) => "String",
            Variant::DateTime(_) => "DateTime",
            Variant::Guid(_) => "Guid",
            Variant::ByteString(_) => "ByteString",
            Variant::NodeId(_) => "NodeId",
            Variant::QualifiedName(_) => "QualifiedName",
            Variant::LocalizedText(_) => "LocalizedText",
            Variant::Array(_) => "Array",
        }
    }

    /// The value rank implied by the variant: -1 for scalars, 1 for arrays.
    pub fn value_rank(&self) -> i32 {
        if self.is_scalar() {
            -1
        } else {
            1
        }
    }

    /// Copy out the part of the value selected by `range`.
    ///
    /// Only arrays and byte strings can be addressed; a range against a
    /// scalar, a multi-dimensional range, or a range past the end fails with
    /// `IndexRangeInvalid`. A range whose upper bound exceeds the length is
    /// clamped as long as the lower bound is in bounds.
    pub fn read_range(&self, range: &NumericRange) -> Result<Variant, Error> {
        let dim = range.single_dimension()?;
        let len = self.len().ok_or_else(|| {
            Error::IndexRangeInvalid(format!("{} on scalar {}", range, self.type_name()))
        })?;
        let (start, end) = clamp(dim.min, dim.max, len, range)?;

        Ok(match self {
            Variant::Array(items) => Variant::Array(items[start..end].to_vec()),
            Variant::ByteString(bytes) => Variant::ByteString(bytes[start..end].to_vec()),
            _ => unreachable!("len() is only Some for arrays and byte strings"),
        })
    }

    /// Overwrite the part of the value selected by `range` with `value`.
    ///
    /// `value` must be of the same kind (array or byte string) and have
    /// exactly as many elements as the range selects.
    pub fn write_range(&mut self, range: &NumericRange, value: Variant) -> Result<(), Error> {
        let dim = range.single_dimension()?;
        let len = self.len().ok_or_else(|| {
            Error::IndexRangeInvalid(format!("{} on scalar {}", range, self.type_name()))
        })?;
        if dim.max as usize >= len {
            return Err(Error::IndexRangeInvalid(format!(
                "{} exceeds length {}",
                range, len
            )));
        }
        let start = dim.min as usize;
        let end = dim.max as usize + 1;

        match (self, value) {
            (Variant::Array(items), Variant::Array(new)) if new.len() == end - start => {
                items.splice(start..end, new);
                Ok(())
            }
            (Variant::ByteString(bytes), Variant::ByteString(new)) if new.len() == end - start => {
                bytes.splice(start..end, new);
                Ok(())
            }
            (current, new) => Err(Error::IndexRangeInvalid(format!(
                "cannot write {} into {} of {}",
                new.type_name(),
                range,
                current.type_name()
            ))),
        }
    }
}

fn clamp(min: u32, max: u32, len: usize, range: &NumericRange) -> Result<(usize, usize), Error> {
    let start = min as usize;
    if start >= len {
        return Err(Error::IndexRangeInvalid(format!(
            "{} exceeds length {}",
            range, len
        )));
    }
    let end = (max as usize).saturating_add(1).min(len);
    Ok((start, end))
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::UInt32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::UInt64(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<NodeId> for Variant {
    fn from(v: NodeId) -> Self {
        Variant::NodeId(Box::new(v))
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(v: Vec<T>) -> Self {
        Variant::Array(v.into_iter().map(Into::into).collect())
    }
}

/// A Variant with its timestamps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataValue {
    pub value: Variant,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    pub fn with_source_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(ts);
        self
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        Self::new(value)
    }
}
