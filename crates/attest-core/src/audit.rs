//! # Audit Log
//!
//! Append-only trail of free-text entries. There is no update or delete path.

use crate::ledger::{format_timestamp, parse_timestamp};
use crate::{AttestError, AuditEntry};
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};

/// Stateless accessor for the `audit_log` table.
pub struct AuditLog;

impl AuditLog {
    /// Append one entry.
    pub fn append(
        conn: &Connection,
        entry: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Result<AuditEntry, AttestError> {
        let entry = entry.into();
        conn.execute(
            "INSERT INTO audit_log (entry, timestamp) VALUES (?1, ?2)",
            params![entry, format_timestamp(timestamp)],
        )?;
        Ok(AuditEntry { entry, timestamp })
    }

    /// All entries, newest first. Entries with equal timestamps are
    /// returned in reverse insertion order.
    pub fn list(conn: &Connection) -> Result<Vec<AuditEntry>, AttestError> {
        let mut stmt =
            conn.prepare("SELECT entry, timestamp FROM audit_log ORDER BY timestamp DESC, rowid DESC")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(entry, timestamp)| {
                Ok(AuditEntry {
                    entry,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    /// Number of entries.
    pub fn count(conn: &Connection) -> Result<u64, AttestError> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
