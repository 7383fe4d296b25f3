//! Record store - the entry point for persisting registered record types
//!
//! A [`RecordStore`] is built once at startup with every record type it may
//! persist. Each registration creates a [`RecordFactory`] keyed by the
//! type's `TypeId`; operations on any other type fail with
//! [`Error::InvalidArgument`] before the database is touched.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use rusqlite::Connection;
use crate::codec::{CodecRegistry, ColumnCodec};
use crate::model::Model;
use crate::value::FieldValue;
use crate::{Error, Result};
use super::database::{Database, DbStats, StoreHooks};
use super::factory::RecordFactory;

/// Table lifecycle of one registered type, independent of the record type
trait RegisteredTable: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn table_name(&self) -> &str;
    fn check_schema(&self) -> Result<()>;
    fn create_table(&self, conn: &Connection) -> Result<()>;
    fn drop_table(&self, conn: &Connection) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

impl<M: Model> RegisteredTable for RecordFactory<M> {
    fn type_name(&self) -> &'static str {
        RecordFactory::type_name(self)
    }

    fn table_name(&self) -> &str {
        RecordFactory::table_name(self)
    }

    fn check_schema(&self) -> Result<()> {
        self.schema().map(|_| ())
    }

    fn create_table(&self, conn: &Connection) -> Result<()> {
        RecordFactory::create_table(self, conn)
    }

    fn drop_table(&self, conn: &Connection) -> Result<()> {
        RecordFactory::drop_table(self, conn)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type TableConstructor = Box<dyn Fn(&Arc<CodecRegistry>, &str, i32) -> Box<dyn RegisteredTable>>;

/// Collects registrations and custom codecs for a [`RecordStore`].
pub struct RecordStoreBuilder {
    db: Arc<Database>,
    table_prefix: String,
    registry: CodecRegistry,
    registrations: Vec<(TypeId, &'static str, TableConstructor)>,
}

impl RecordStoreBuilder {
    /// Prefix prepended to every derived table name
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Register a codec, replacing any codec for the same semantic type
    pub fn codec(mut self, codec: Arc<dyn ColumnCodec>) -> Self {
        if let Some(previous) = self.registry.register(codec) {
            tracing::debug!("replaced codec for {}", previous.semantic_type());
        }
        self
    }

    /// Register a persistable record type
    pub fn register<M: Model>(mut self) -> Self {
        let type_id = TypeId::of::<M>();
        if self.registrations.iter().any(|(id, _, _)| *id == type_id) {
            tracing::debug!("{} is already registered", std::any::type_name::<M>());
            return self;
        }
        let constructor: TableConstructor = Box::new(|registry, prefix, version| {
            Box::new(RecordFactory::<M>::new(Arc::clone(registry), prefix, version)) as Box<dyn RegisteredTable>
        });
        self.registrations.push((type_id, std::any::type_name::<M>(), constructor));
        self
    }

    /// Derive every registered schema; any failure rejects the whole store
    pub fn build(self) -> Result<RecordStore> {
        let registry = Arc::new(self.registry);
        let version = self.db.version();

        let mut tables = Vec::with_capacity(self.registrations.len());
        let mut by_type = HashMap::with_capacity(self.registrations.len());
        for (type_id, rust_name, constructor) in self.registrations {
            let table = constructor(&registry, &self.table_prefix, version);
            if let Err(e) = table.check_schema() {
                tracing::error!("cannot register {}: {}", rust_name, e);
                return Err(e);
            }
            tracing::debug!("registered {} as table {}", rust_name, table.table_name());
            by_type.insert(type_id, tables.len());
            tables.push(table);
        }

        Ok(RecordStore {
            db: self.db,
            table_prefix: self.table_prefix,
            tables,
            by_type,
        })
    }
}

/// Type-safe persistence facade over a shared [`Database`].
pub struct RecordStore {
    db: Arc<Database>,
    table_prefix: String,
    tables: Vec<Box<dyn RegisteredTable>>,
    by_type: HashMap<TypeId, usize>,
}

impl RecordStore {
    pub fn builder(db: Arc<Database>) -> RecordStoreBuilder {
        RecordStoreBuilder {
            db,
            table_prefix: String::new(),
            registry: CodecRegistry::default(),
            registrations: Vec::new(),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn is_registered<M: Model>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<M>())
    }

    /// `(type name, table name)` for every registered type, in registration order
    pub fn registered_tables(&self) -> Vec<(&'static str, &str)> {
        self.tables.iter().map(|t| (t.type_name(), t.table_name())).collect()
    }

    pub fn table_name<M: Model>(&self) -> Result<String> {
        Ok(self.factory::<M>("table_name")?.table_name().to_string())
    }

    pub fn create_statement<M: Model>(&self) -> Result<String> {
        self.factory::<M>("create_statement")?.create_statement()
    }

    /// Open the database now instead of on first use
    pub fn open(&self) -> Result<()> {
        self.db.open(self)
    }

    pub fn close(&self) -> Result<()> {
        self.db.close()
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.db.table_stats(&self.table_prefix)
    }

    // ========== Record Operations ==========

    /// Insert a new record or update a persisted one; returns its id
    pub fn save<M: Model>(&self, record: &mut M) -> Result<i64> {
        let factory = self.factory::<M>("save")?;
        self.run(|conn| {
            if record.id() > 0 {
                factory.update(conn, record)?;
            } else {
                factory.insert(conn, record)?;
            }
            Ok(record.id())
        })
    }

    pub fn get<M: Model>(&self, id: i64) -> Result<Option<M>> {
        let factory = self.factory::<M>("get")?;
        if id <= 0 {
            return Err(Error::InvalidArgument(format!(
                "Attempt to get a record with a non-positive id: {}",
                id
            )));
        }
        self.run(|conn| factory.get(conn, id))
    }

    /// Every record of the type, optionally ordered and paged
    pub fn get_all<M: Model>(&self, order: Option<&str>, page: i64, page_size: i64) -> Result<Vec<M>> {
        let factory = self.factory::<M>("get_all")?;
        self.run(|conn| factory.find(conn, None, &[], order, page, page_size))
    }

    /// Query by raw predicate with positional parameters, ordering and
    /// 1-based paging (`page <= 0` or `page_size <= 0` disables paging)
    pub fn find<M: Model>(
        &self,
        predicate: Option<&str>,
        params: &[FieldValue],
        order: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<M>> {
        let factory = self.factory::<M>("find")?;
        self.run(|conn| factory.find(conn, predicate, params, order, page, page_size))
    }

    pub fn find_count<M: Model>(&self) -> Result<usize> {
        let factory = self.factory::<M>("find_count")?;
        self.run(|conn| factory.count(conn))
    }

    /// Delete a persisted record by its id
    pub fn delete<M: Model>(&self, record: &M) -> Result<usize> {
        let factory = self.factory::<M>("delete")?;
        if record.id() <= 0 {
            return Err(Error::InvalidArgument(format!(
                "Attempt to delete a record with a non-positive id: {}",
                record.id()
            )));
        }
        self.run(|conn| factory.delete(conn, record))
    }

    pub fn delete_where<M: Model>(&self, predicate: &str, params: &[FieldValue]) -> Result<usize> {
        let factory = self.factory::<M>("delete_where")?;
        if predicate.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Attempt to delete with an empty where clause".to_string(),
            ));
        }
        self.run(|conn| factory.delete_where(conn, predicate, params))
    }

    pub fn delete_all<M: Model>(&self) -> Result<usize> {
        let factory = self.factory::<M>("delete_all")?;
        self.run(|conn| factory.delete_all(conn))
    }

    // ========== Internals ==========

    fn factory<M: Model>(&self, operation: &str) -> Result<&RecordFactory<M>> {
        self.by_type
            .get(&TypeId::of::<M>())
            .and_then(|&index| self.tables[index].as_any().downcast_ref::<RecordFactory<M>>())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Unknown model type passed to {}: {}",
                    operation,
                    std::any::type_name::<M>()
                ))
            })
    }

    fn run<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.db.with_connection(self, f)
    }
}

impl StoreHooks for RecordStore {
    fn on_create(&self, conn: &Connection) -> Result<()> {
        for table in &self.tables {
            table.create_table(conn)?;
        }
        Ok(())
    }

    fn on_upgrade(&self, conn: &Connection, old_version: i32, new_version: i32) -> Result<()> {
        tracing::warn!(
            "schema version {} -> {}: dropping {} tables, existing rows are discarded",
            old_version,
            new_version,
            self.tables.len()
        );
        for table in &self.tables {
            table.drop_table(conn)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("db", &self.db)
            .field("table_prefix", &self.table_prefix)
            .field("tables", &self.registered_tables())
            .finish()
    }
}
