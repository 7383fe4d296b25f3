//! Storage Layer - SQLite-backed record persistence
//!
//! - `database`: shared connection handle with versioned lazy open
//! - `factory`: per-type CRUD against one derived table
//! - `store`: registration of record types and the public operations
//! - `sql`: statement builders

pub mod sql;
pub mod database;
pub mod factory;
pub mod store;

pub use database::{Database, DbStats, StoreHooks, TableStats};
pub use factory::RecordFactory;
pub use store::{RecordStore, RecordStoreBuilder};
