//! # Modelstore - Descriptor-driven record persistence over SQLite
//!
//! Modelstore maps plain Rust record types onto SQLite tables:
//! - Record types declare their fields once through a [`TypeDescriptor`]
//! - Table schemas are derived from descriptors and a [`CodecRegistry`]
//! - A shared [`Database`] handle opens lazily and reconciles schema versions
//! - [`RecordStore`] exposes save/get/find/count/delete for registered types

pub mod value;
pub mod codec;
pub mod model;
pub mod schema;
pub mod storage;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use value::{Affinity, FieldKind, FieldValue, SemanticType};
pub use codec::{CodecRegistry, ColumnCodec};
pub use model::{FieldDef, Model, ModelBase, TypeDescriptor};
pub use schema::{SchemaDeriver, SchemaError, TableSchema};
pub use storage::{Database, DbStats, RecordFactory, RecordStore, StoreHooks};

/// Result type alias for Modelstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Modelstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database version {found} is newer than supported version {expected}")]
    Downgrade { found: i32, expected: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
