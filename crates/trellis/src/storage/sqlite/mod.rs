//! SQLite closure-table backend.
//!
//! Direct edges live in `edges`, the materialized transitive closure in
//! `closure`. Every mutation opens an `IMMEDIATE` transaction, so the write
//! lock is taken before the cycle and duplicate checks run and no other writer
//! can slip in between check and apply.

mod closure;
mod schema;
mod trait_impl;

use crate::error::{Error, Result};
use rusqlite::Connection;
use schema::{SCHEMA, SCRATCH};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-backed relationship store and requirement catalog.
///
/// The connection is wrapped in a `Mutex`; SQLite's own locking (WAL plus a
/// busy timeout) coordinates with other processes using the same file.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open or create the database and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the parent directory cannot be created and
    /// `Error::Persistence` for any SQLite failure.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        let _journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;

        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(SCRATCH)?;

        tracing::debug!(path = %path.display(), busy_timeout_ms, "SQLite schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the connection lock.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Persistence(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }
}
