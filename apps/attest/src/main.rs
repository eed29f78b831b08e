//! # Attest - Compliance Policy & Training Tracker
//!
//! The main binary for Attest.
//!
//! This application provides:
//! - HTTP JSON API server (axum-based)
//! - CLI interface for inspecting the ledger and the policy store
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  apps/attest (THE BINARY)                 │
//! │                                                           │
//! │  ┌───────────┐   ┌────────────┐   ┌───────────────────┐   │
//! │  │   CLI     │   │  HTTP API  │   │  Remote backends  │   │
//! │  │  (clap)   │   │   (axum)   │   │  (blob, summary)  │   │
//! │  └─────┬─────┘   └─────┬──────┘   └─────────┬─────────┘   │
//! │        └───────────────┼────────────────────┘             │
//! │                        ▼                                  │
//! │                ┌───────────────┐                          │
//! │                │  attest-core  │                          │
//! │                │ (THE LEDGER)  │                          │
//! │                └───────────────┘                          │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! attest server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! attest dashboard
//! attest audit -n 20
//! attest --config attest.toml policies
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ATTEST_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ATTEST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "attest=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = attest::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = attest::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Attest startup banner.
fn print_banner() {
    println!(
        r#"
   _   _   _            _
  /_\ | |_| |_ ___  ___| |_
 / _ \|  _|  _/ -_)(_-<|  _|
/_/ \_\\__|\__\___|/__/ \__|

  Compliance Policy & Training Tracker v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
