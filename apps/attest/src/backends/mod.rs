//! # Backends
//!
//! Builds the policy store and the summarizer selected by the configuration.
//!
//! - `azure`: Azure Blob Storage over its REST API
//! - `inference`: HTTP summarization endpoint
//!
//! The core traits are blocking. Remote backends drive their async HTTP
//! client on the current Tokio runtime, so they must be called from a
//! blocking-pool thread (`tokio::task::spawn_blocking`).

pub mod azure;
pub mod inference;

pub use azure::{AzureBlobStore, ConnectionString};
pub use inference::InferenceSummarizer;

use crate::config::{Config, StorageKind, SummarizerKind};
use attest_core::{
    AttestError, LeadSentenceSummarizer, MemoryPolicyStore, PolicyStore, RedbPolicyStore,
    Summarizer,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured policy store.
pub fn build_store(config: &Config) -> Result<Arc<dyn PolicyStore>, AttestError> {
    let storage = &config.storage;
    let store: Arc<dyn PolicyStore> = match storage.kind() {
        StorageKind::Azure => {
            let raw = storage.connection_string.as_deref().ok_or_else(|| {
                AttestError::Config("storage backend 'azure' requires a connection string".into())
            })?;
            let conn = ConnectionString::parse(raw)?;
            Arc::new(AzureBlobStore::new(conn, &storage.container)?)
        }
        StorageKind::Local => Arc::new(RedbPolicyStore::open(&storage.path)?),
        StorageKind::Memory => Arc::new(MemoryPolicyStore::new()),
    };
    tracing::info!(
        event = "store_ready",
        backend = store.backend(),
        container = %storage.container,
        "Policy store ready"
    );
    Ok(store)
}

/// Build the configured summarizer.
pub fn build_summarizer(config: &Config) -> Result<Arc<dyn Summarizer>, AttestError> {
    let settings = &config.summarizer;
    let summarizer: Arc<dyn Summarizer> = match settings.kind() {
        SummarizerKind::Inference => {
            let url = settings.url.clone().ok_or_else(|| {
                AttestError::Config("summarizer backend 'inference' requires a url".into())
            })?;
            Arc::new(InferenceSummarizer::new(
                url,
                settings.token.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?)
        }
        SummarizerKind::Lead => Arc::new(LeadSentenceSummarizer),
    };
    tracing::info!(
        event = "summarizer_ready",
        backend = summarizer.backend(),
        "Summarizer ready"
    );
    Ok(summarizer)
}

/// Run `future` to completion on the current runtime from a blocking thread.
///
/// `wrap` converts the failure when no runtime is available.
pub(crate) fn block_on<F: Future>(
    future: F,
    wrap: fn(String) -> AttestError,
) -> Result<F::Output, AttestError> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| wrap(format!("no async runtime: {}", e)))?;
    Ok(handle.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_from_config() {
        let config = Config::from_toml("[storage]\nbackend = \"memory\"\n").expect("config");
        let store = build_store(&config).expect("store");
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn local_store_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.storage.path = dir.path().join("policies.redb");
        assert_eq!(build_store(&config).expect("store").backend(), "local");
    }

    #[test]
    fn lead_summarizer_by_default() {
        let summarizer = build_summarizer(&Config::default()).expect("summarizer");
        assert_eq!(summarizer.backend(), "lead");
    }

    #[test]
    fn block_on_without_runtime_fails() {
        let result = block_on(async { 1 }, AttestError::Storage);
        assert!(matches!(result, Err(AttestError::Storage(_))));
    }
}
