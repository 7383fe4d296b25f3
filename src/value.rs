//! Field values - the typed side of every column
//!
//! Every persisted field carries one of seven semantic types:
//! - `Bool`, `Int32`, `Int64`: stored with `INTEGER` affinity
//! - `Float32`, `Float64`: stored with `REAL` affinity
//! - `String`: stored with `TEXT` affinity
//! - `Timestamp`: epoch milliseconds with `INTEGER` affinity
//!
//! Anything else is tagged `Other` and only persists when a codec for
//! that tag has been registered.

use chrono::{DateTime, Utc};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value};
use std::fmt;

/// Semantic type of a declared record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Timestamp,
    /// A declared type with no built-in codec (collections, nested records, ...)
    Other(&'static str),
}

impl SemanticType {
    /// Get the string representation of the semantic type
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Bool => "bool",
            SemanticType::Int32 => "int32",
            SemanticType::Int64 => "int64",
            SemanticType::Float32 => "float32",
            SemanticType::Float64 => "float64",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Other(label) => label,
        }
    }

    /// The seven types that ship with a codec
    pub fn builtin() -> &'static [SemanticType] {
        &[
            SemanticType::Bool,
            SemanticType::Int32,
            SemanticType::Int64,
            SemanticType::Float32,
            SemanticType::Float64,
            SemanticType::String,
            SemanticType::Timestamp,
        ]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Native column affinity used in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field value in its semantic form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    /// `None` is an absent date; it is stored as `0`
    Timestamp(Option<DateTime<Utc>>),
}

impl FieldValue {
    /// Semantic type this value belongs to
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            FieldValue::Bool(_) => SemanticType::Bool,
            FieldValue::Int32(_) => SemanticType::Int32,
            FieldValue::Int64(_) => SemanticType::Int64,
            FieldValue::Float32(_) => SemanticType::Float32,
            FieldValue::Float64(_) => SemanticType::Float64,
            FieldValue::Text(_) => SemanticType::String,
            FieldValue::Timestamp(_) => SemanticType::Timestamp,
        }
    }

    /// Store-native form, identical to what the built-in codecs store
    pub fn to_native(&self) -> Value {
        crate::codec::native_value(self)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.to_native()))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Rust types that map onto one semantic type.
///
/// Implemented for the primitive field types so record descriptors can use
/// typed getters and setters (`fn(&M) -> T`, `fn(&mut M, T)`).
pub trait FieldKind: Sized {
    const SEMANTIC: SemanticType;

    fn into_value(self) -> FieldValue;

    /// `None` when the value belongs to a different semantic type
    fn from_value(value: FieldValue) -> Option<Self>;
}

macro_rules! field_kind {
    ($ty:ty, $variant:ident) => {
        impl FieldKind for $ty {
            const SEMANTIC: SemanticType = SemanticType::$variant;

            fn into_value(self) -> FieldValue {
                FieldValue::$variant(self)
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::$variant(value)
            }
        }
    };
}

field_kind!(bool, Bool);
field_kind!(i32, Int32);
field_kind!(i64, Int64);
field_kind!(f32, Float32);
field_kind!(f64, Float64);

impl FieldKind for String {
    const SEMANTIC: SemanticType = SemanticType::String;

    fn into_value(self) -> FieldValue {
        FieldValue::Text(self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl FieldKind for Option<DateTime<Utc>> {
    const SEMANTIC: SemanticType = SemanticType::Timestamp;

    fn into_value(self) -> FieldValue {
        FieldValue::Timestamp(self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

impl FieldKind for DateTime<Utc> {
    const SEMANTIC: SemanticType = SemanticType::Timestamp;

    fn into_value(self) -> FieldValue {
        FieldValue::Timestamp(Some(self))
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(ts) => Some(ts.unwrap_or(DateTime::UNIX_EPOCH)),
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_rejects_other_variants() {
        assert_eq!(i32::from_value(FieldValue::Int32(7)), Some(7));
        assert_eq!(i32::from_value(FieldValue::Int64(7)), None);
        assert_eq!(String::from_value(FieldValue::Bool(true)), None);
    }

    #[test]
    fn test_absent_timestamp_is_epoch_for_required_dates() {
        let date = DateTime::<Utc>::from_value(FieldValue::Timestamp(None)).unwrap();
        assert_eq!(date.timestamp_millis(), 0);
        assert_eq!(FieldValue::Timestamp(None).to_native(), Value::Integer(0));
    }

    #[test]
    fn test_bool_native_form() {
        assert_eq!(FieldValue::Bool(true).to_native(), Value::Integer(1));
        assert_eq!(FieldValue::Bool(false).to_native(), Value::Integer(0));
    }
}
