//! Logical types for attribute values.

use super::Value;
use std::fmt;

/// The declared type of an attribute.
///
/// `Null` is accepted by every logical type; an attribute is cleared by
/// setting it to [`Value::Null`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Accepts any value.
    Any,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Raw bytes.
    Bytes,
    /// Homogeneous or heterogeneous list of values.
    List,
}

impl LogicalType {
    /// Returns true if `value` may be stored in an attribute of this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::Bool, Value::Bool(_))
            | (Self::Int64, Value::Int64(_))
            | (Self::Float64, Value::Float64(_) | Value::Int64(_))
            | (Self::String, Value::String(_))
            | (Self::Bytes, Value::Bytes(_))
            | (Self::List, Value::List(_)) => true,
            _ => false,
        }
    }

    /// Returns the upper-case type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Bool => "BOOL",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::List => "LIST",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
