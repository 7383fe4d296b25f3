//! Database handle - guarded lazy open of one SQLite connection
//!
//! The application owns a [`Database`] and shares it (usually behind an
//! `Arc`) with the record store. The connection is opened on first use under
//! a mutex; concurrent first opens race to a single initialization.
//!
//! On first open the handle compares SQLite's `user_version` with the
//! configured version and fires the [`StoreHooks`]:
//! - `0` (fresh file): `on_create`
//! - older version: `on_upgrade`, then `on_create`
//! - newer version: refused with [`Error::Downgrade`]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use rusqlite::Connection;
use crate::{Error, Result};
use super::sql;

/// Lifecycle callbacks fired by [`Database::open`].
pub trait StoreHooks {
    /// Called on every first open; must be idempotent
    fn on_create(&self, conn: &Connection) -> Result<()>;

    /// Called when the stored version is older than the configured one
    fn on_upgrade(&self, conn: &Connection, old_version: i32, new_version: i32) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Application-owned handle to the backing SQLite database.
#[derive(Debug)]
pub struct Database {
    location: Location,
    version: i32,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Handle for a database file (created on first open if missing)
    pub fn open_path(path: impl AsRef<Path>, version: i32) -> Self {
        Self::with_location(Location::File(path.as_ref().to_path_buf()), version)
    }

    /// Handle for a private in-memory database (for testing).
    /// Its contents are lost on [`close`](Self::close).
    pub fn in_memory(version: i32) -> Self {
        Self::with_location(Location::Memory, version)
    }

    fn with_location(location: Location, version: i32) -> Self {
        Self {
            location,
            version,
            conn: Mutex::new(None),
        }
    }

    /// Configured schema version, stamped onto inserted records
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Open the connection if it is not open yet. Idempotent.
    pub fn open(&self, hooks: &dyn StoreHooks) -> Result<()> {
        let mut guard = self.lock();
        self.ensure_open(&mut guard, hooks)?;
        Ok(())
    }

    /// Run `f` against the open connection, opening it first if needed.
    /// The connection stays locked for the duration of `f`.
    pub fn with_connection<T>(
        &self,
        hooks: &dyn StoreHooks,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock();
        let conn = self.ensure_open(&mut guard, hooks)?;
        f(conn)
    }

    /// Close the connection. Closing an already closed handle is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        if let Some(conn) = guard.take() {
            tracing::debug!("closing database {}", self.describe());
            conn.close().map_err(|(_, e)| Error::Storage(e))?;
        }
        Ok(())
    }

    /// Row counts for every table whose name starts with `prefix`.
    ///
    /// A closed handle is inspected through a temporary connection, so no
    /// lifecycle hooks fire and the stored version is left untouched.
    pub fn table_stats(&self, prefix: &str) -> Result<DbStats> {
        let guard = self.lock();
        match guard.as_ref() {
            Some(conn) => collect_stats(conn, prefix),
            None => {
                let conn = self.connect()?;
                collect_stats(&conn, prefix)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // poisoning only means another caller panicked mid-call; the handle itself is intact
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open<'g>(
        &self,
        guard: &'g mut MutexGuard<'_, Option<Connection>>,
        hooks: &dyn StoreHooks,
    ) -> Result<&'g Connection> {
        if guard.is_none() {
            let conn = self.connect()?;
            self.prepare(&conn, hooks)?;
            **guard = Some(conn);
        }
        guard
            .as_ref()
            .ok_or_else(|| Error::Persistence(format!("database {} is not open", self.describe())))
    }

    fn connect(&self) -> Result<Connection> {
        tracing::debug!("opening database {}", self.describe());
        let conn = match &self.location {
            Location::File(path) => Connection::open(path)?,
            Location::Memory => Connection::open_in_memory()?,
        };
        Ok(conn)
    }

    /// Reconcile the stored version with the configured one
    fn prepare(&self, conn: &Connection, hooks: &dyn StoreHooks) -> Result<()> {
        let stored: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if stored > self.version {
            return Err(Error::Downgrade {
                found: stored,
                expected: self.version,
            });
        }

        let tx = conn.unchecked_transaction()?;
        if stored != 0 && stored < self.version {
            tracing::info!(
                "upgrading database {} from version {} to {}",
                self.describe(),
                stored,
                self.version
            );
            hooks.on_upgrade(&tx, stored, self.version)?;
        }
        hooks.on_create(&tx)?;
        if stored != self.version {
            tx.pragma_update(None, "user_version", self.version)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

fn collect_stats(conn: &Connection, prefix: &str) -> Result<DbStats> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND substr(name, 1, length(?1)) = ?1 ORDER BY name",
    )?;
    let names: Vec<String> = stmt
        .query_map([prefix], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let rows: i64 = conn.query_row(&sql::count(&name), [], |row| row.get(0))?;
        tables.push(TableStats {
            name,
            rows: rows as usize,
        });
    }

    Ok(DbStats { version, tables })
}

/// Row count of one table
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TableStats {
    pub name: String,
    pub rows: usize,
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub version: i32,
    pub tables: Vec<TableStats>,
}

impl DbStats {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Version: {}", self.version)?;
        writeln!(f, "  Tables: {}", self.tables.len())?;
        for table in &self.tables {
            writeln!(f, "    {}: {}", table.name, table.rows)?;
        }
        write!(f, "  Rows: {}", self.total_rows())
    }
}
