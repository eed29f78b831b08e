//! # Storage Module
//!
//! - `sqlite`: the relational file for the ledger and audit trail
//! - `migrations`: versioned schema steps for that file
//! - `redb_store`: the local, single-file policy container

pub mod migrations;
pub mod redb_store;
pub mod sqlite;

pub use migrations::{LATEST_VERSION, MigrationReport, migrate};
pub use redb_store::RedbPolicyStore;
pub use sqlite::Database;
