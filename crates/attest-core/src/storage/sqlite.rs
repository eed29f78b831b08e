//! # SQLite Database Handle
//!
//! Owns the single connection to the ledger/audit file. Opening always runs
//! the schema migrations, so every handle sees the latest schema.

use super::migrations::{self, MigrationReport};
use crate::AttestError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// The relational file holding `audit_log` and `training_status`.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    migration: MigrationReport,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("schema_version", &self.migration.to_version)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create a database file and migrate it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AttestError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AttestError::Database(format!(
                    "cannot create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database (tests, demos).
    pub fn open_in_memory() -> Result<Self, AttestError> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self, AttestError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let migration = migrations::migrate(&mut conn)?;
        Ok(Self {
            conn,
            path,
            migration,
        })
    }

    /// The migrations applied when this handle was opened.
    #[must_use]
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// File path, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
