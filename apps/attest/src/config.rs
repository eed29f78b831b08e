//! # Configuration
//!
//! An optional TOML file, overlaid with environment variables.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "compliance.db"
//!
//! [storage]
//! backend = "azure"            # azure | local | memory
//! connection_string = "..."
//! container = "policyfiles"
//!
//! [summarizer]
//! backend = "inference"        # inference | lead
//! url = "https://..."
//!
//! [[users]]
//! name = "admin"
//! password = "admin123"
//! role = "Admin"
//! ```
//!
//! ## Environment Overrides
//!
//! - `ATTEST_STORAGE_CONNECTION_STRING` (or legacy `AZURE_CONNECTION_STRING`)
//! - `ATTEST_CONTAINER`
//! - `ATTEST_SUMMARIZER_URL`
//! - `ATTEST_SUMMARIZER_TOKEN`

use attest_core::{Account, AttestError, Role, StaticIdentityProvider};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Container name used when none is configured.
pub const DEFAULT_CONTAINER: &str = "policyfiles";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("compliance.db"),
        }
    }
}

/// Which policy store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Azure,
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Explicit backend; inferred from `connection_string` when absent.
    pub backend: Option<StorageKind>,
    pub connection_string: Option<String>,
    pub container: String,
    /// redb file for the `local` backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: None,
            connection_string: None,
            container: DEFAULT_CONTAINER.to_string(),
            path: PathBuf::from("policies.redb"),
        }
    }
}

impl StorageConfig {
    /// The backend to build: explicit, else `azure` when a connection
    /// string is present, else `local`.
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.backend.unwrap_or(if self.connection_string.is_some() {
            StorageKind::Azure
        } else {
            StorageKind::Local
        })
    }
}

/// Which summarization model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerKind {
    Inference,
    Lead,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummarizerConfig {
    /// Explicit backend; inferred from `url` when absent.
    pub backend: Option<SummarizerKind>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            backend: None,
            url: None,
            token: None,
            timeout_secs: 30,
        }
    }
}

impl SummarizerConfig {
    #[must_use]
    pub fn kind(&self) -> SummarizerKind {
        self.backend.unwrap_or(if self.url.is_some() {
            SummarizerKind::Inference
        } else {
            SummarizerKind::Lead
        })
    }
}

/// One `[[users]]` entry.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub name: String,
    pub password: String,
    pub role: Role,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// The whole configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub summarizer: SummarizerConfig,
    pub users: Vec<UserConfig>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, AttestError> {
        toml::from_str(text).map_err(|e| AttestError::Config(e.to_string()))
    }

    /// Read the file at `path`, or the defaults when `path` is `None`,
    /// then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AttestError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AttestError::Config(format!("cannot read '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(conn) = non_empty("ATTEST_STORAGE_CONNECTION_STRING")
            .or_else(|| non_empty("AZURE_CONNECTION_STRING"))
        {
            self.storage.connection_string = Some(conn);
        }
        if let Some(container) = non_empty("ATTEST_CONTAINER") {
            self.storage.container = container;
        }
        if let Some(url) = non_empty("ATTEST_SUMMARIZER_URL") {
            self.summarizer.url = Some(url);
        }
        if let Some(token) = non_empty("ATTEST_SUMMARIZER_TOKEN") {
            self.summarizer.token = Some(token);
        }
    }

    /// Reject combinations that cannot be built.
    pub fn validate(&self) -> Result<(), AttestError> {
        if self.storage.kind() == StorageKind::Azure && self.storage.connection_string.is_none() {
            return Err(AttestError::Config(
                "storage backend 'azure' requires a connection string".to_string(),
            ));
        }
        if self.storage.container.trim().is_empty() {
            return Err(AttestError::Config("storage container is empty".to_string()));
        }
        if self.summarizer.kind() == SummarizerKind::Inference && self.summarizer.url.is_none() {
            return Err(AttestError::Config(
                "summarizer backend 'inference' requires a url".to_string(),
            ));
        }
        if let Some(user) = self.users.iter().find(|u| u.name.trim().is_empty()) {
            return Err(AttestError::Config(format!(
                "user with role {} has an empty name",
                user.role
            )));
        }
        Ok(())
    }

    /// The identity table: configured users, or the built-in accounts.
    #[must_use]
    pub fn identity_provider(&self) -> StaticIdentityProvider {
        if self.users.is_empty() {
            return StaticIdentityProvider::default();
        }
        StaticIdentityProvider::new(
            self.users
                .iter()
                .map(|u| Account::new(u.name.clone(), u.password.clone(), u.role)),
        )
    }

    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================
