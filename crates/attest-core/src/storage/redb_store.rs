//! # redb-backed Policy Store
//!
//! A single-file local container for policy documents, used when no remote
//! object store is configured. redb gives us:
//! - ACID writes (an upload is visible completely or not at all)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

use crate::policy::{PolicyStore, validate_content};
use crate::{AttestError, PolicyInfo, PolicyName};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Table for documents: blob name -> serialized `StoredPolicy` bytes
const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// On-disk record for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPolicy {
    content: String,
    /// Milliseconds since the Unix epoch.
    last_modified_ms: i64,
}

impl StoredPolicy {
    fn last_modified(&self) -> Result<DateTime<Utc>, AttestError> {
        DateTime::from_timestamp_millis(self.last_modified_ms).ok_or_else(|| {
            AttestError::InvalidRecord(format!(
                "last-modified {} out of range",
                self.last_modified_ms
            ))
        })
    }
}

fn storage_err(e: impl std::fmt::Display) -> AttestError {
    AttestError::Storage(e.to_string())
}

/// A policy container stored in a redb file.
pub struct RedbPolicyStore {
    db: Database,
}

impl std::fmt::Debug for RedbPolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbPolicyStore").finish_non_exhaustive()
    }
}

impl RedbPolicyStore {
    /// Open or create a container file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AttestError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(POLICIES).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<u64, AttestError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(POLICIES).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }

    pub fn is_empty(&self) -> Result<bool, AttestError> {
        Ok(self.len()? == 0)
    }

    fn get(&self, name: &PolicyName) -> Result<Option<StoredPolicy>, AttestError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(POLICIES).map_err(storage_err)?;

        match table.get(name.as_str()).map_err(storage_err)? {
            Some(data) => {
                let stored: StoredPolicy = postcard::from_bytes(data.value())
                    .map_err(|e| AttestError::SerializationError(e.to_string()))?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }
}

impl PolicyStore for RedbPolicyStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn list(&self) -> Result<Vec<PolicyInfo>, AttestError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(POLICIES).map_err(storage_err)?;

        let mut listing = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let stored: StoredPolicy = postcard::from_bytes(value.value())
                .map_err(|e| AttestError::SerializationError(e.to_string()))?;
            listing.push(PolicyInfo {
                name: key.value().to_string(),
                last_modified: stored.last_modified()?,
            });
        }
        Ok(listing)
    }

    fn upload(&self, name: &PolicyName, content: &str) -> Result<(), AttestError> {
        validate_content(content)?;
        let record = StoredPolicy {
            content: content.to_string(),
            last_modified_ms: Utc::now().timestamp_millis(),
        };
        let bytes = postcard::to_allocvec(&record)
            .map_err(|e| AttestError::SerializationError(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(POLICIES).map_err(storage_err)?;
            table
                .insert(name.as_str(), bytes.as_slice())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn download(&self, name: &PolicyName) -> Result<String, AttestError> {
        self.get(name)?
            .map(|stored| stored.content)
            .ok_or_else(|| AttestError::PolicyNotFound(name.to_string()))
    }

    fn delete(&self, name: &PolicyName) -> Result<(), AttestError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = write_txn.open_table(POLICIES).map_err(storage_err)?;
            table.remove(name.as_str()).map_err(storage_err)?.is_some()
        };
        if !removed {
            // Nothing changed; dropping the transaction aborts it.
            return Err(AttestError::PolicyNotFound(name.to_string()));
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn exists(&self, name: &PolicyName) -> Result<bool, AttestError> {
        Ok(self.get(name)?.is_some())
    }
}
