//! Schema derivation - from a type descriptor to a table schema
//!
//! The deriver walks a [`TypeDescriptor`] (own fields first, ancestors last),
//! drops ignored fields and fields without a codec, and produces an ordered
//! [`TableSchema`]. A single bad field never aborts derivation; a column name
//! collision or an unusable column name does.

use crate::codec::{CodecRegistry, ColumnCodec};
use crate::model::{FieldDef, Getter, Setter, TypeDescriptor};
use crate::value::{Affinity, SemanticType};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Name of the primary key column present in every table
pub const ID_COLUMN_NAME: &str = "id";

/// SQLite keywords that cannot be used as bare column names
const RESERVED_WORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current_date", "current_time", "current_timestamp", "database", "default", "deferrable",
    "deferred", "delete", "desc", "detach", "distinct", "drop", "each", "else", "end",
    "escape", "except", "exclusive", "exists", "explain", "fail", "for", "foreign", "from",
    "full", "glob", "group", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "left", "like", "limit", "match", "natural", "no", "not", "notnull", "null", "of",
    "offset", "on", "or", "order", "outer", "plan", "pragma", "primary", "query", "raise",
    "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "right", "rollback", "row", "savepoint", "select", "set", "table", "temp",
    "temporary", "then", "to", "transaction", "trigger", "union", "unique", "update", "using",
    "vacuum", "values", "view", "virtual", "when", "where", "with", "without",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"))
}

/// Check that `name` can appear unquoted as a table or column name
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name) && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str())
}

/// Derive the table name from a fully-qualified type name.
///
/// Namespace separators (`::`, `.`, `$`) and generic brackets become
/// underscores, so `app::notes::Note` with prefix `ms_` maps to
/// `ms_app_notes_Note`.
pub fn table_name_for(type_name: &str, prefix: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + type_name.len());
    name.push_str(prefix);

    let mut chars = type_name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                }
                name.push('_');
            }
            '.' | '$' | '<' | '>' | ',' | ' ' => name.push('_'),
            other => name.push(other),
        }
    }
    name
}

/// Schema derivation failures that make a type unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("column '{column}' is declared more than once in {type_name}")]
    DuplicateColumn { type_name: String, column: String },

    #[error("column name '{column}' in {type_name} is not a plain SQL identifier")]
    InvalidColumnName { type_name: String, column: String },

    #[error("table name '{table}' derived from {type_name} is not a plain SQL identifier")]
    InvalidTableName { type_name: String, table: String },
}

/// Binds one field to one store column and its codec.
pub struct ColumnDescriptor<M> {
    name: &'static str,
    semantic: SemanticType,
    codec: Arc<dyn ColumnCodec>,
    getter: Getter<M>,
    setter: Setter<M>,
}

impl<M> ColumnDescriptor<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic
    }

    pub fn affinity(&self) -> Affinity {
        self.codec.affinity()
    }

    pub fn codec(&self) -> &dyn ColumnCodec {
        self.codec.as_ref()
    }

    pub fn getter(&self) -> &Getter<M> {
        &self.getter
    }

    pub fn setter(&self) -> &Setter<M> {
        &self.setter
    }
}

impl<M> fmt::Debug for ColumnDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("semantic", &self.semantic)
            .field("affinity", &self.affinity())
            .finish()
    }
}

/// Table name plus ordered column descriptors for one record type.
pub struct TableSchema<M> {
    table_name: String,
    columns: Vec<ColumnDescriptor<M>>,
    by_name: HashMap<&'static str, usize>,
}

impl<M> TableSchema<M> {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnDescriptor<M>] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Look up a column descriptor by column name
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor<M>> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema
    pub fn create_statement(&self) -> String {
        let mut columns = String::new();
        for column in &self.columns {
            columns.push_str(",\n");
            columns.push_str(column.name);
            columns.push(' ');
            columns.push_str(column.affinity().as_str());
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{} INTEGER PRIMARY KEY{}\n);",
            self.table_name, ID_COLUMN_NAME, columns
        )
    }
}

impl<M> fmt::Debug for TableSchema<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchema")
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Builds table schemas from type descriptors using a codec registry.
pub struct SchemaDeriver<'a> {
    registry: &'a CodecRegistry,
    table_prefix: &'a str,
}

impl<'a> SchemaDeriver<'a> {
    pub fn new(registry: &'a CodecRegistry, table_prefix: &'a str) -> Self {
        Self {
            registry,
            table_prefix,
        }
    }

    pub fn table_name<M: 'static>(&self, descriptor: &TypeDescriptor<M>) -> String {
        table_name_for(descriptor.type_name(), self.table_prefix)
    }

    /// Derive the table schema for `descriptor`
    pub fn derive<M: 'static>(&self, descriptor: &TypeDescriptor<M>) -> Result<TableSchema<M>, SchemaError> {
        let type_name = descriptor.type_name();
        let table_name = self.table_name(descriptor);
        if !is_valid_identifier(&table_name) {
            return Err(SchemaError::InvalidTableName {
                type_name: type_name.to_string(),
                table: table_name,
            });
        }

        let mut columns: Vec<ColumnDescriptor<M>> = Vec::new();
        let mut by_name: HashMap<&'static str, usize> = HashMap::new();

        for field in descriptor.all_fields() {
            if field.is_ignored() {
                tracing::debug!("{}: field '{}' is ignored", type_name, field.name());
                continue;
            }

            let Some(column) = self.column_for(type_name, field) else {
                continue;
            };

            if column.name == ID_COLUMN_NAME || by_name.contains_key(column.name) {
                return Err(SchemaError::DuplicateColumn {
                    type_name: type_name.to_string(),
                    column: column.name.to_string(),
                });
            }
            if !is_valid_identifier(column.name) {
                return Err(SchemaError::InvalidColumnName {
                    type_name: type_name.to_string(),
                    column: column.name.to_string(),
                });
            }

            by_name.insert(column.name, columns.len());
            columns.push(column);
        }

        tracing::debug!(
            "derived schema for {} -> {} ({} columns)",
            type_name,
            table_name,
            columns.len()
        );

        Ok(TableSchema {
            table_name,
            columns,
            by_name,
        })
    }

    /// Map one field to a column, or `None` when it cannot be persisted
    fn column_for<M: 'static>(&self, type_name: &str, field: &FieldDef<M>) -> Option<ColumnDescriptor<M>> {
        let Some(codec) = self.registry.lookup(field.semantic_type()) else {
            tracing::warn!(
                "{}: no codec for field '{}' of type {}, skipping",
                type_name,
                field.name(),
                field.semantic_type()
            );
            return None;
        };

        let (Some(getter), Some(setter)) = (field.getter(), field.setter()) else {
            tracing::warn!(
                "{}: field '{}' is not both readable and writable, skipping",
                type_name,
                field.name()
            );
            return None;
        };

        Some(ColumnDescriptor {
            name: field.name(),
            semantic: field.semantic_type(),
            codec,
            getter: Arc::clone(getter),
            setter: Arc::clone(setter),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, ModelBase};
    use chrono::{DateTime, Utc};

    #[derive(Debug, Default)]
    struct Sample {
        base: ModelBase,
        name: String,
        active: bool,
        ratio: f32,
        due: Option<DateTime<Utc>>,
        scratch: String,
        checksum: i64,
    }

    impl Model for Sample {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("app::sample::Sample")
                .field(FieldDef::new("name", |s: &Sample| s.name.clone(), |s, v| s.name = v))
                .field(FieldDef::new("active", |s: &Sample| s.active, |s, v| s.active = v))
                .field(FieldDef::new("ratio", |s: &Sample| s.ratio, |s, v| s.ratio = v))
                .field(FieldDef::new("due", |s: &Sample| s.due, |s, v| s.due = v))
                .field(FieldDef::opaque("children", "Vec<Sample>"))
                .field(FieldDef::new("scratch", |s: &Sample| s.scratch.clone(), |s, v| s.scratch = v).ignore())
                .field(FieldDef::read_only("checksum", |s: &Sample| s.checksum))
                .extends(ModelBase::descriptor(), |s| &s.base, |s| &mut s.base)
        }

        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }
    }

    fn derive_sample() -> TableSchema<Sample> {
        let registry = CodecRegistry::default();
        SchemaDeriver::new(&registry, "ms_")
            .derive(&Sample::descriptor())
            .unwrap()
    }

    #[test]
    fn test_table_name_replaces_separators() {
        assert_eq!(table_name_for("app::notes::Note", "ms_"), "ms_app_notes_Note");
        assert_eq!(table_name_for("com.example.Outer$Inner", ""), "com_example_Outer_Inner");
    }

    #[test]
    fn test_columns_skip_ignored_unsupported_and_unwritable_fields() {
        let schema = derive_sample();
        assert_eq!(
            schema.column_names(),
            vec!["name", "active", "ratio", "due", "created_at", "modified_at", "schema_version"]
        );
        assert!(schema.column("scratch").is_none());
        assert!(schema.column("children").is_none());
        assert_eq!(schema.column("due").unwrap().affinity(), Affinity::Integer);
        let _ = (Sample::default().scratch, Sample::default().checksum);
    }

    #[test]
    fn test_create_statement_layout() {
        let schema = derive_sample();
        let expected = "CREATE TABLE IF NOT EXISTS ms_app_sample_Sample (\n\
                        id INTEGER PRIMARY KEY,\n\
                        name TEXT,\n\
                        active INTEGER,\n\
                        ratio REAL,\n\
                        due INTEGER,\n\
                        created_at INTEGER,\n\
                        modified_at INTEGER,\n\
                        schema_version INTEGER\n\
                        );";
        assert_eq!(schema.create_statement(), expected);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        assert_eq!(derive_sample().create_statement(), derive_sample().create_statement());
    }

    #[derive(Debug, Default)]
    struct Shadowing {
        base: ModelBase,
        created_at: i64,
    }

    impl Model for Shadowing {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("app::Shadowing")
                .field(FieldDef::new("created_at", |s: &Shadowing| s.created_at, |s, v| s.created_at = v))
                .extends(ModelBase::descriptor(), |s| &s.base, |s| &mut s.base)
        }

        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }
    }

    #[test]
    fn test_duplicate_column_across_hierarchy_fails() {
        let registry = CodecRegistry::default();
        let err = SchemaDeriver::new(&registry, "")
            .derive(&Shadowing::descriptor())
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateColumn {
                type_name: "app::Shadowing".to_string(),
                column: "created_at".to_string(),
            }
        );
    }

    #[test]
    fn test_reserved_column_names_are_rejected() {
        assert!(is_valid_identifier("string_field"));
        assert!(!is_valid_identifier("order"));
        assert!(!is_valid_identifier("Select"));
        assert!(!is_valid_identifier("bad name"));
        assert!(!is_valid_identifier("1st"));
    }

    #[derive(Debug, Default)]
    struct Hyphenated {
        base: ModelBase,
    }

    impl Model for Hyphenated {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("my-app::Order")
                .extends(ModelBase::descriptor(), |h| &h.base, |h| &mut h.base)
        }

        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }
    }

    #[derive(Debug, Default)]
    struct Order {
        base: ModelBase,
    }

    impl Model for Order {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("Order")
                .extends(ModelBase::descriptor(), |o| &o.base, |o| &mut o.base)
        }

        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }
    }

    #[test]
    fn test_invalid_table_names_are_rejected() {
        let registry = CodecRegistry::default();

        let err = SchemaDeriver::new(&registry, "ms_")
            .derive(&Hyphenated::descriptor())
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidTableName {
                type_name: "my-app::Order".to_string(),
                table: "ms_my-app_Order".to_string(),
            }
        );

        let err = SchemaDeriver::new(&registry, "")
            .derive(&Order::descriptor())
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTableName { ref table, .. } if table == "Order"));

        let schema = SchemaDeriver::new(&registry, "ms_").derive(&Order::descriptor()).unwrap();
        assert_eq!(schema.table_name(), "ms_Order");
    }
}
