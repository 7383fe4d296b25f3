//! Column codecs - reversible conversion between field values and SQLite columns
//!
//! A [`ColumnCodec`] owns one semantic type. The [`CodecRegistry`] maps each
//! semantic type to exactly one codec; fields whose type has no codec are
//! left out of the derived schema.

use crate::value::{Affinity, FieldValue, SemanticType};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::Row;
use rusqlite::types::{Type, Value, ValueRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional converter for one semantic type.
pub trait ColumnCodec: Send + Sync {
    /// The semantic type this codec handles
    fn semantic_type(&self) -> SemanticType;

    /// Column affinity emitted in DDL
    fn affinity(&self) -> Affinity;

    /// Read the native column at `position` and convert it to a field value
    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue>;

    /// Convert a field value to its native column value
    fn encode(&self, value: &FieldValue) -> Result<Value>;
}

fn mismatch(codec: SemanticType, value: &FieldValue) -> Error {
    Error::Codec(format!(
        "{} codec cannot encode a {} value",
        codec,
        value.semantic_type()
    ))
}

fn conversion_failure(position: usize, ty: Type) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(position, format!("column {}", position), ty)
}

/// Native column value of a built-in field value; shared by the built-in
/// codecs and bound query parameters
pub(crate) fn native_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(b) => Value::Integer(if *b { 1 } else { 0 }),
        FieldValue::Int32(v) => Value::Integer(i64::from(*v)),
        FieldValue::Int64(v) => Value::Integer(*v),
        FieldValue::Float32(v) => Value::Real(f64::from(*v)),
        FieldValue::Float64(v) => Value::Real(*v),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Timestamp(ts) => Value::Integer(ts.map(|t| t.timestamp_millis()).unwrap_or(0)),
    }
}

/// Read an integer column, treating NULL as zero
fn read_integer(row: &Row<'_>, position: usize) -> rusqlite::Result<i64> {
    match row.get_ref(position)? {
        ValueRef::Null => Ok(0),
        ValueRef::Integer(v) => Ok(v),
        ValueRef::Real(v) => Ok(v as i64),
        other => Err(conversion_failure(position, other.data_type())),
    }
}

/// Read a real column, treating NULL as zero
fn read_real(row: &Row<'_>, position: usize) -> rusqlite::Result<f64> {
    match row.get_ref(position)? {
        ValueRef::Null => Ok(0.0),
        ValueRef::Integer(v) => Ok(v as f64),
        ValueRef::Real(v) => Ok(v),
        other => Err(conversion_failure(position, other.data_type())),
    }
}

/// Booleans are `1`/`0`; any non-zero integer decodes as true
pub struct BoolCodec;

impl ColumnCodec for BoolCodec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Bool
    }

    fn affinity(&self) -> Affinity {
        Affinity::Integer
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        Ok(FieldValue::Bool(read_integer(row, position)? != 0))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Bool(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

pub struct Int32Codec;

impl ColumnCodec for Int32Codec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Int32
    }

    fn affinity(&self) -> Affinity {
        Affinity::Integer
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        let raw = read_integer(row, position)?;
        let v = i32::try_from(raw)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(position, raw))?;
        Ok(FieldValue::Int32(v))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Int32(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

pub struct Int64Codec;

impl ColumnCodec for Int64Codec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Int64
    }

    fn affinity(&self) -> Affinity {
        Affinity::Integer
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        Ok(FieldValue::Int64(read_integer(row, position)?))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Int64(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

/// `f32` widens losslessly to the store's 64-bit REAL
pub struct Float32Codec;

impl ColumnCodec for Float32Codec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Float32
    }

    fn affinity(&self) -> Affinity {
        Affinity::Real
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        Ok(FieldValue::Float32(read_real(row, position)? as f32))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Float32(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

pub struct Float64Codec;

impl ColumnCodec for Float64Codec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Float64
    }

    fn affinity(&self) -> Affinity {
        Affinity::Real
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        Ok(FieldValue::Float64(read_real(row, position)?))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Float64(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

pub struct StringCodec;

impl ColumnCodec for StringCodec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::String
    }

    fn affinity(&self) -> Affinity {
        Affinity::Text
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        let text = match row.get_ref(position)? {
            ValueRef::Null => String::new(),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            ValueRef::Integer(v) => v.to_string(),
            ValueRef::Real(v) => v.to_string(),
            ValueRef::Blob(_) => return Err(conversion_failure(position, Type::Blob)),
        };
        Ok(FieldValue::Text(text))
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Text(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

/// Dates are stored as epoch milliseconds; an absent date is stored as `0`
pub struct TimestampCodec;

impl ColumnCodec for TimestampCodec {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Timestamp
    }

    fn affinity(&self) -> Affinity {
        Affinity::Integer
    }

    fn decode(&self, row: &Row<'_>, position: usize) -> rusqlite::Result<FieldValue> {
        match row.get_ref(position)? {
            ValueRef::Null => Ok(FieldValue::Timestamp(None)),
            ValueRef::Integer(millis) => {
                let ts = DateTime::from_timestamp_millis(millis)
                    .ok_or(rusqlite::Error::IntegralValueOutOfRange(position, millis))?;
                Ok(FieldValue::Timestamp(Some(ts)))
            }
            other => Err(conversion_failure(position, other.data_type())),
        }
    }

    fn encode(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Timestamp(_) => Ok(native_value(value)),
            other => Err(mismatch(self.semantic_type(), other)),
        }
    }
}

/// Registry of codecs keyed by semantic type.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<SemanticType, Arc<dyn ColumnCodec>>,
}

impl CodecRegistry {
    /// Create a registry with no codecs
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec, replacing any codec already held for its type
    pub fn register(&mut self, codec: Arc<dyn ColumnCodec>) -> Option<Arc<dyn ColumnCodec>> {
        self.codecs.insert(codec.semantic_type(), codec)
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_codec(mut self, codec: Arc<dyn ColumnCodec>) -> Self {
        self.register(codec);
        self
    }

    /// Look up the codec for a semantic type
    pub fn lookup(&self, ty: SemanticType) -> Option<Arc<dyn ColumnCodec>> {
        self.codecs.get(&ty).cloned()
    }

    pub fn supports(&self, ty: SemanticType) -> bool {
        self.codecs.contains_key(&ty)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl Default for CodecRegistry {
    /// The built-in codecs for the seven semantic types
    fn default() -> Self {
        Self::empty()
            .with_codec(Arc::new(BoolCodec))
            .with_codec(Arc::new(Int32Codec))
            .with_codec(Arc::new(Int64Codec))
            .with_codec(Arc::new(Float32Codec))
            .with_codec(Arc::new(Float64Codec))
            .with_codec(Arc::new(StringCodec))
            .with_codec(Arc::new(TimestampCodec))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.codecs.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("CodecRegistry").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rusqlite::Connection;

    /// Encode through the codec, select it back from SQLite, decode again
    fn roundtrip(value: FieldValue) -> FieldValue {
        let registry = CodecRegistry::default();
        let codec = registry.lookup(value.semantic_type()).unwrap();
        let native = codec.encode(&value).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        conn.query_row("SELECT ?1", [native], |row| codec.decode(row, 0))
            .unwrap()
    }

    #[test]
    fn test_default_registry_covers_builtin_types() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.len(), SemanticType::builtin().len());
        for ty in SemanticType::builtin() {
            let codec = registry.lookup(*ty).unwrap();
            assert_eq!(codec.semantic_type(), *ty);
        }
        assert!(!registry.supports(SemanticType::Other("Vec<String>")));
    }

    #[test]
    fn test_affinities() {
        let registry = CodecRegistry::default();
        let affinity = |ty| registry.lookup(ty).unwrap().affinity();
        assert_eq!(affinity(SemanticType::Bool), Affinity::Integer);
        assert_eq!(affinity(SemanticType::Timestamp), Affinity::Integer);
        assert_eq!(affinity(SemanticType::Float32), Affinity::Real);
        assert_eq!(affinity(SemanticType::String), Affinity::Text);
    }

    #[test]
    fn test_bound_parameters_match_stored_columns() {
        let registry = CodecRegistry::default();
        let stamp = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        for value in [
            FieldValue::Bool(true),
            FieldValue::Int32(-12),
            FieldValue::Int64(1 << 40),
            FieldValue::Float32(2.5),
            FieldValue::Float64(-0.125),
            FieldValue::Text("plain".to_string()),
            FieldValue::Timestamp(Some(stamp)),
            FieldValue::Timestamp(None),
        ] {
            let codec = registry.lookup(value.semantic_type()).unwrap();
            assert_eq!(codec.encode(&value).unwrap(), value.to_native(), "{:?}", value);
        }
    }

    #[test]
    fn test_scalar_roundtrip() {
        for value in [
            FieldValue::Bool(true),
            FieldValue::Bool(false),
            FieldValue::Int32(i32::MIN),
            FieldValue::Int32(0),
            FieldValue::Int32(1234),
            FieldValue::Int64(i64::MIN),
            FieldValue::Int64(0),
            FieldValue::Int64(123_456_789),
            FieldValue::Float32(876.11),
            FieldValue::Float32(-0.5),
            FieldValue::Float32(0.0),
            FieldValue::Float64(56.78),
            FieldValue::Float64(-1.0e300),
            FieldValue::Float64(0.0),
            FieldValue::Text(String::new()),
            FieldValue::Text("ahjjdshjdhjs123 ünïcødé".to_string()),
        ] {
            assert_eq!(roundtrip(value.clone()), value);
        }
    }

    #[test]
    fn test_timestamp_roundtrip_at_millisecond_precision() {
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        let past = Utc.with_ymd_and_hms(1999, 4, 10, 12, 35, 45).unwrap();
        let now = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();

        for ts in [epoch, past, now] {
            let value = FieldValue::Timestamp(Some(ts));
            assert_eq!(roundtrip(value.clone()), value);
        }
    }

    #[test]
    fn test_absent_timestamp_encodes_to_zero() {
        let codec = TimestampCodec;
        assert_eq!(codec.encode(&FieldValue::Timestamp(None)).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_bool_decodes_any_nonzero_as_true() {
        let conn = Connection::open_in_memory().unwrap();
        let value = conn
            .query_row("SELECT 42", [], |row| BoolCodec.decode(row, 0))
            .unwrap();
        assert_eq!(value, FieldValue::Bool(true));
    }

    #[test]
    fn test_null_decodes_to_zero_values() {
        let conn = Connection::open_in_memory().unwrap();
        let (int, text, ts) = conn
            .query_row("SELECT NULL, NULL, NULL", [], |row| {
                Ok((
                    Int64Codec.decode(row, 0)?,
                    StringCodec.decode(row, 1)?,
                    TimestampCodec.decode(row, 2)?,
                ))
            })
            .unwrap();
        assert_eq!(int, FieldValue::Int64(0));
        assert_eq!(text, FieldValue::Text(String::new()));
        assert_eq!(ts, FieldValue::Timestamp(None));
    }

    #[test]
    fn test_encode_rejects_wrong_variant() {
        assert!(Int32Codec.encode(&FieldValue::Text("1".into())).is_err());
        assert!(StringCodec.encode(&FieldValue::Int64(1)).is_err());
    }

    #[test]
    fn test_register_replaces_existing_codec() {
        let mut registry = CodecRegistry::default();
        let previous = registry.register(Arc::new(StringCodec));
        assert!(previous.is_some());
        assert_eq!(registry.len(), SemanticType::builtin().len());
    }
}
