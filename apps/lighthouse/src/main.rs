//! # Lighthouse
//!
//! Collects data about a web page, audits it and prints a report.
//!
//! ## Usage
//!
//! ```bash
//! # Collect and audit in one go
//! lighthouse https://example.com --output html --output-path report.html
//!
//! # Collect only, then audit the saved artifacts later
//! lighthouse https://example.com -G ./saved
//! lighthouse -A ./saved
//!
//! # Inspect what would run
//! lighthouse list-audits
//! lighthouse print-config --only-categories performance
//! ```
//!
//! Logs go to stderr; stdout carries only the report.

use clap::Parser;
use lighthouse::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // LIGHTHOUSE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LIGHTHOUSE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lighthouse=info,lighthouse_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
