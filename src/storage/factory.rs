//! Record factory - CRUD for one record type against its table
//!
//! The factory derives its [`TableSchema`] lazily on first use and keeps it
//! for its whole lifetime. Rows are decoded column by column: `id` goes to
//! the record identity, every other column goes through its codec. Columns
//! the schema does not know about are logged and skipped.

use std::sync::{Arc, OnceLock};
use rusqlite::{Connection, Row, params_from_iter};
use rusqlite::types::Value;
use crate::codec::CodecRegistry;
use crate::model::Model;
use crate::schema::{ID_COLUMN_NAME, SchemaDeriver, SchemaError, TableSchema, table_name_for};
use crate::value::FieldValue;
use crate::{Error, Result};
use super::sql;

/// Current wall-clock time in epoch milliseconds
fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Treat blank clauses as absent
fn clause(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// CRUD engine for the table backing record type `M`.
pub struct RecordFactory<M: Model> {
    type_name: &'static str,
    table_name: String,
    table_prefix: String,
    schema_version: i32,
    registry: Arc<CodecRegistry>,
    schema: OnceLock<std::result::Result<TableSchema<M>, SchemaError>>,
}

impl<M: Model> RecordFactory<M> {
    pub fn new(registry: Arc<CodecRegistry>, table_prefix: impl Into<String>, schema_version: i32) -> Self {
        let table_prefix = table_prefix.into();
        let type_name = M::descriptor().type_name();
        Self {
            type_name,
            table_name: table_name_for(type_name, &table_prefix),
            table_prefix,
            schema_version,
            registry,
            schema: OnceLock::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The derived schema; derived on first call and cached, failures included
    pub fn schema(&self) -> Result<&TableSchema<M>> {
        self.schema
            .get_or_init(|| SchemaDeriver::new(&self.registry, &self.table_prefix).derive(&M::descriptor()))
            .as_ref()
            .map_err(|e| Error::Schema(e.clone()))
    }

    pub fn create_statement(&self) -> Result<String> {
        Ok(self.schema()?.create_statement())
    }

    // ========== Table Operations ==========

    pub fn create_table(&self, conn: &Connection) -> Result<()> {
        let statement = self.create_statement()?;
        conn.execute_batch(&statement)?;
        Ok(())
    }

    pub fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute(&sql::drop_table(&self.table_name), [])?;
        Ok(())
    }

    // ========== Record Operations ==========

    /// Stamp and insert a new record, assigning its id on success
    pub fn insert(&self, conn: &Connection, record: &mut M) -> Result<i64> {
        let schema = self.schema()?;

        let now = now_millis();
        let base = record.base_mut();
        base.modified_at = now;
        base.created_at = now;
        base.schema_version = self.schema_version;

        let (columns, values) = self.encode_columns(schema, record);
        let changed = conn
            .execute(&sql::insert(&self.table_name, &columns), params_from_iter(values.iter()))
            .inspect_err(|e| tracing::error!("Failed to insert into {}: {}", self.table_name, e))?;

        let id = conn.last_insert_rowid();
        if changed == 0 || id <= 0 {
            tracing::error!("Failed to insert into {}: row id {}", self.table_name, id);
            return Err(Error::Persistence(format!(
                "insert into {} returned invalid row id {}",
                self.table_name, id
            )));
        }

        record.base_mut().id = id;
        Ok(id)
    }

    /// Re-stamp and write every column of a persisted record.
    /// Returns the number of rows changed; `0` when the id no longer exists.
    pub fn update(&self, conn: &Connection, record: &mut M) -> Result<usize> {
        let schema = self.schema()?;
        record.base_mut().modified_at = now_millis();

        let (columns, mut values) = self.encode_columns(schema, record);
        values.push(Value::Integer(record.id()));

        let affected = conn.execute(
            &sql::update_by_id(&self.table_name, &columns),
            params_from_iter(values.iter()),
        )?;
        if affected == 0 {
            tracing::debug!("update of {} id {} matched no rows", self.table_name, record.id());
        }
        Ok(affected)
    }

    /// Fetch one record by id
    pub fn get(&self, conn: &Connection, id: i64) -> Result<Option<M>> {
        let schema = self.schema()?;
        let mut stmt = conn.prepare(&sql::select_by_id(&self.table_name))?;
        let names = column_names(&stmt);

        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(self.decode_row(schema, &names, row))),
            None => {
                tracing::debug!("no record with id {} in {}", id, self.table_name);
                Ok(None)
            }
        }
    }

    /// Query with an optional raw predicate, ordering and 1-based paging.
    /// `page <= 0` or `page_size <= 0` returns every matching row.
    pub fn find(
        &self,
        conn: &Connection,
        predicate: Option<&str>,
        params: &[FieldValue],
        order: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<M>> {
        let schema = self.schema()?;
        let query = sql::select(
            &self.table_name,
            clause(predicate),
            clause(order),
            sql::page_window(page, page_size),
        );
        tracing::debug!("find: {}", query);

        let mut stmt = conn.prepare(&query)?;
        let names = column_names(&stmt);

        let mut records = Vec::new();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            records.push(self.decode_row(schema, &names, row));
        }
        Ok(records)
    }

    /// Total number of rows in the table
    pub fn count(&self, conn: &Connection) -> Result<usize> {
        let count: i64 = conn.query_row(&sql::count(&self.table_name), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn delete(&self, conn: &Connection, record: &M) -> Result<usize> {
        let deleted = conn.execute(&sql::delete_by_id(&self.table_name), [record.id()])?;
        Ok(deleted)
    }

    /// Delete rows matching a raw predicate
    pub fn delete_where(&self, conn: &Connection, predicate: &str, params: &[FieldValue]) -> Result<usize> {
        let deleted = conn.execute(
            &sql::delete_where(&self.table_name, predicate),
            params_from_iter(params.iter()),
        )?;
        Ok(deleted)
    }

    /// Remove every row, keeping the table
    pub fn delete_all(&self, conn: &Connection) -> Result<usize> {
        let deleted = conn.execute(&sql::truncate(&self.table_name), [])?;
        Ok(deleted)
    }

    // ========== Row Mapping ==========

    /// Encode every column; a field that fails to encode is logged and left out
    fn encode_columns(&self, schema: &TableSchema<M>, record: &M) -> (Vec<&'static str>, Vec<Value>) {
        let mut columns = Vec::with_capacity(schema.columns().len());
        let mut values = Vec::with_capacity(schema.columns().len());

        for column in schema.columns() {
            let value = (column.getter())(record);
            match column.codec().encode(&value) {
                Ok(native) => {
                    columns.push(column.name());
                    values.push(native);
                }
                Err(e) => {
                    tracing::warn!("{}: failed to encode field '{}': {}", self.type_name, column.name(), e);
                }
            }
        }
        (columns, values)
    }

    fn decode_row(&self, schema: &TableSchema<M>, names: &[String], row: &Row<'_>) -> M {
        let mut record = M::default();

        for (position, name) in names.iter().enumerate() {
            if name == ID_COLUMN_NAME {
                match row.get::<_, i64>(position) {
                    Ok(id) => record.base_mut().id = id,
                    Err(e) => tracing::warn!("{}: unreadable id column: {}", self.table_name, e),
                }
                continue;
            }

            let Some(column) = schema.column(name) else {
                tracing::warn!("{}: no field for column '{}', ignoring", self.table_name, name);
                continue;
            };

            let decoded = column
                .codec()
                .decode(row, position)
                .map_err(Error::from)
                .and_then(|value| (column.setter())(&mut record, value));
            if let Err(e) = decoded {
                tracing::warn!("{}: failed to decode column '{}': {}", self.table_name, name, e);
            }
        }
        record
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}
