//! # Schema Migrations
//!
//! Versioned, forward-only migrations for the relational file. The applied
//! version lives in SQLite's `user_version` pragma.
//!
//! Files written by the first deployments carry `user_version = 0` but may
//! already hold both tables, with or without the `score` column. Every step
//! is therefore written to adopt such files in place.

use crate::AttestError;
use rusqlite::{Connection, Transaction};

/// One schema step.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// All migrations, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create audit_log and training_status",
        apply: create_base_tables,
    },
    Migration {
        version: 2,
        description: "add training_status.score",
        apply: add_score_column,
    },
    Migration {
        version: 3,
        description: "index training_status by user, module and status",
        apply: index_training_status,
    },
];

/// Schema version this build writes.
pub const LATEST_VERSION: u32 = 3;

/// What `migrate` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: Vec<u32>,
}

impl MigrationReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

fn create_base_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            entry TEXT,
            timestamp TEXT
        );
        CREATE TABLE IF NOT EXISTS training_status (
            user TEXT,
            role TEXT,
            module TEXT,
            status TEXT,
            timestamp TEXT,
            due_date TEXT
        );
        "#,
    )
}

fn add_score_column(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    if column_exists(tx, "training_status", "score")? {
        return Ok(());
    }
    tx.execute_batch("ALTER TABLE training_status ADD COLUMN score INTEGER NOT NULL DEFAULT 0;")
}

fn index_training_status(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_training_user_module_status
            ON training_status(user, module, status);",
    )
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt.query_map([table], |row| row.get::<_, String>(0))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read the applied schema version.
pub fn current_version(conn: &Connection) -> Result<u32, AttestError> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Apply every pending migration, each in its own transaction.
///
/// Fails without touching the file if it was written by a newer build.
pub fn migrate(conn: &mut Connection) -> Result<MigrationReport, AttestError> {
    let from_version = current_version(conn)?;
    if from_version > LATEST_VERSION {
        return Err(AttestError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            from_version, LATEST_VERSION
        )));
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        let tx = conn.transaction()?;
        (migration.apply)(&tx).map_err(|e| {
            AttestError::Migration(format!(
                "v{} ({}) failed: {}",
                migration.version, migration.description, e
            ))
        })?;
        // PRAGMA does not take bound parameters.
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        tx.commit()?;
        applied.push(migration.version);
    }

    Ok(MigrationReport {
        from_version,
        to_version: current_version(conn)?,
        applied,
    })
}
