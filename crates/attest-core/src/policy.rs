//! # Policy Store
//!
//! The container of policy documents, behind a trait so the remote object
//! store, the embedded redb file and the in-memory map are interchangeable.
//!
//! Store errors are reported, never retried.

use crate::primitives::MAX_POLICY_BYTES;
use crate::{AttestError, PolicyInfo, PolicyName};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A container of plain-text policy documents addressed by name.
///
/// Implementations are blocking; async callers run them on a blocking thread.
pub trait PolicyStore: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    /// Every document with its last-modified time, ordered by name.
    fn list(&self) -> Result<Vec<PolicyInfo>, AttestError>;

    /// Create or overwrite a document.
    fn upload(&self, name: &PolicyName, content: &str) -> Result<(), AttestError>;

    /// Full text of a document, or `PolicyNotFound`.
    fn download(&self, name: &PolicyName) -> Result<String, AttestError>;

    /// Remove a document, or `PolicyNotFound`.
    fn delete(&self, name: &PolicyName) -> Result<(), AttestError>;

    /// Whether a document exists.
    fn exists(&self, name: &PolicyName) -> Result<bool, AttestError> {
        Ok(self.list()?.iter().any(|info| info.name == name.as_str()))
    }
}

/// Fail with `PolicyNotFound` unless `name` is in `store`.
pub fn require_existing(store: &dyn PolicyStore, name: &PolicyName) -> Result<(), AttestError> {
    if store.exists(name)? {
        Ok(())
    } else {
        Err(AttestError::PolicyNotFound(name.to_string()))
    }
}

/// Check a document body before it is stored.
pub fn validate_content(content: &str) -> Result<(), AttestError> {
    if content.len() > MAX_POLICY_BYTES {
        return Err(AttestError::InvalidPolicyContent(format!(
            "document size {} bytes exceeds maximum {} bytes",
            content.len(),
            MAX_POLICY_BYTES
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    last_modified: DateTime<Utc>,
}

/// A process-local container.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    documents: Mutex<BTreeMap<String, StoredDocument>>,
}

impl MemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredDocument>>, AttestError> {
        self.documents
            .lock()
            .map_err(|_| AttestError::Storage("memory store lock poisoned".to_string()))
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn list(&self) -> Result<Vec<PolicyInfo>, AttestError> {
        Ok(self
            .documents()?
            .iter()
            .map(|(name, doc)| PolicyInfo {
                name: name.clone(),
                last_modified: doc.last_modified,
            })
            .collect())
    }

    fn upload(&self, name: &PolicyName, content: &str) -> Result<(), AttestError> {
        validate_content(content)?;
        self.documents()?.insert(
            name.as_str().to_string(),
            StoredDocument {
                content: content.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn download(&self, name: &PolicyName) -> Result<String, AttestError> {
        self.documents()?
            .get(name.as_str())
            .map(|doc| doc.content.clone())
            .ok_or_else(|| AttestError::PolicyNotFound(name.to_string()))
    }

    fn delete(&self, name: &PolicyName) -> Result<(), AttestError> {
        self.documents()?
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| AttestError::PolicyNotFound(name.to_string()))
    }

    fn exists(&self, name: &PolicyName) -> Result<bool, AttestError> {
        Ok(self.documents()?.contains_key(name.as_str()))
    }
}
