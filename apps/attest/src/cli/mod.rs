//! # Attest CLI Module
//!
//! This module implements the CLI interface for Attest.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `migrate` - Bring the database schema up to date
//! - `dashboard` - Show pending / completed / overdue counts and stored policies
//! - `audit` - Print the audit trail
//! - `users` - List the identities that can log in
//! - `policies` - List the stored policy documents

mod commands;

use crate::config::Config;
use attest_core::AttestError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Attest - Compliance Policy & Training Tracker
///
/// Distributes policy documents, assigns training, quizzes staff and keeps
/// an append-only audit trail.
#[derive(Parser, Debug)]
#[command(name = "attest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the ledger database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the configuration file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the configuration file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply pending schema migrations
    Migrate,

    /// Show training counts and stored policies
    Dashboard,

    /// Print the audit trail, newest first
    Audit {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List the identities that can log in
    Users,

    /// List stored policy documents
    Policies,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Load the configuration named by the global flags.
pub fn load_config(cli: &Cli) -> Result<Config, AttestError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AttestError> {
    let mut config = load_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Migrate) => cmd_migrate(&config, json_mode),
        Some(Commands::Audit { limit }) => cmd_audit(&config, json_mode, limit),
        Some(Commands::Users) => cmd_users(&config, json_mode),
        Some(Commands::Policies) => cmd_policies(&config, json_mode).await,
        Some(Commands::Dashboard) | None => cmd_dashboard(&config, json_mode).await,
    }
}
