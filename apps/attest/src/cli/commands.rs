//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::backends::{build_store, build_summarizer};
use crate::config::Config;
use attest_core::{
    AttestError, Database, IdentityProvider, PolicyInfo, PolicyStore, StaticIdentityProvider,
    Tracker,
};
use chrono::Local;
use std::sync::Arc;

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn open_tracker(config: &Config) -> Result<Tracker, AttestError> {
    let identities: Arc<StaticIdentityProvider> = Arc::new(config.identity_provider());
    Tracker::open(&config.database.path, identities)
}

async fn list_policies(store: Arc<dyn PolicyStore>) -> Result<Vec<PolicyInfo>, AttestError> {
    tokio::task::spawn_blocking(move || store.list())
        .await
        .map_err(|e| AttestError::IoError(format!("blocking task failed: {}", e)))?
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), AttestError> {
    let tracker = open_tracker(config)?;
    let report = tracker.migration_report().clone();
    let store = build_store(config)?;
    let summarizer = build_summarizer(config)?;

    println!("Attest Compliance Tracker Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:    {}", config.bind_address());
    println!("  Database:   {} (schema v{})", config.database.path.display(), report.to_version);
    println!("  Store:      {} ({})", store.backend(), config.storage.container);
    println!("  Summarizer: {}", summarizer.backend());
    println!("  Users:      {}", tracker.users().len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if !report.is_noop() {
        tracing::info!(
            event = "migrated",
            from = report.from_version,
            to = report.to_version,
            "Database schema migrated"
        );
    }

    let state = AppState::new(tracker, store, summarizer);
    api::run_server(&config.bind_address(), state).await
}

// =============================================================================
// MIGRATE COMMAND
// =============================================================================

/// Open the database, which applies any pending migrations.
pub fn cmd_migrate(config: &Config, json_mode: bool) -> Result<(), AttestError> {
    let db = Database::open(&config.database.path)?;
    let report = db.migration_report();

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.database.path.to_string_lossy(),
            "from_version": report.from_version,
            "to_version": report.to_version,
            "applied": report.applied,
        }));
        return Ok(());
    }

    println!("Database: {}", config.database.path.display());
    if report.is_noop() {
        println!("Schema is up to date (v{})", report.to_version);
    } else {
        println!(
            "Migrated schema v{} -> v{} (applied: {:?})",
            report.from_version, report.to_version, report.applied
        );
    }
    Ok(())
}

// =============================================================================
// DASHBOARD COMMAND
// =============================================================================

/// Show training counts and stored policies.
pub async fn cmd_dashboard(config: &Config, json_mode: bool) -> Result<(), AttestError> {
    let tracker = open_tracker(config)?;
    let counts = tracker.dashboard(Local::now().date_naive())?;
    let listing = list_policies(build_store(config)?).await;

    if json_mode {
        let (policies, error) = match &listing {
            Ok(p) => (serde_json::to_value(p).unwrap_or_default(), None),
            Err(e) => (serde_json::Value::Array(Vec::new()), Some(e.to_string())),
        };
        print_json(&serde_json::json!({
            "pending": counts.pending,
            "completed": counts.completed,
            "overdue": counts.overdue,
            "policies": policies,
            "policy_error": error,
        }));
        return Ok(());
    }

    println!("Attest Dashboard");
    println!("================");
    println!("Pending Trainings:   {}", counts.pending);
    println!("Completed Trainings: {}", counts.completed);
    println!("Overdue Trainings:   {}", counts.overdue);
    println!();
    println!("Stored Policies");
    println!("---------------");
    match listing {
        Ok(policies) if policies.is_empty() => println!("(none)"),
        Ok(policies) => {
            for p in policies {
                println!(
                    "{} - Uploaded {}",
                    p.name,
                    p.last_modified.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Err(e) => println!("Error fetching policies: {}", e),
    }
    Ok(())
}

// =============================================================================
// AUDIT COMMAND
// =============================================================================

/// Print the audit trail, newest first.
pub fn cmd_audit(config: &Config, json_mode: bool, limit: Option<usize>) -> Result<(), AttestError> {
    let tracker = open_tracker(config)?;
    let mut entries = tracker.audit_trail()?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if json_mode {
        print_json(&serde_json::to_value(&entries).unwrap_or_default());
        return Ok(());
    }

    if entries.is_empty() {
        println!("Audit trail is empty");
    }
    for e in entries {
        println!("{} - {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.entry);
    }
    Ok(())
}

// =============================================================================
// USERS COMMAND
// =============================================================================

/// List the identities that can log in.
pub fn cmd_users(config: &Config, json_mode: bool) -> Result<(), AttestError> {
    let users = config.identity_provider().users();

    if json_mode {
        print_json(&serde_json::to_value(&users).unwrap_or_default());
        return Ok(());
    }

    let source = if config.users.is_empty() {
        "built-in"
    } else {
        "configured"
    };
    println!("Users ({})", source);
    for user in users {
        println!("  {:<16} {}", user.name, user.role);
    }
    Ok(())
}

// =============================================================================
// POLICIES COMMAND
// =============================================================================

/// List stored policy documents.
pub async fn cmd_policies(config: &Config, json_mode: bool) -> Result<(), AttestError> {
    let policies = list_policies(build_store(config)?).await?;

    if json_mode {
        print_json(&serde_json::to_value(&policies).unwrap_or_default());
        return Ok(());
    }

    if policies.is_empty() {
        println!("No policies stored");
    }
    for p in policies {
        println!(
            "{:<40} {}",
            p.name,
            p.last_modified.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
