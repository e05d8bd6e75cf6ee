//! # Lighthouse CLI Module
//!
//! ## Available Commands
//!
//! - `run` - Collect and/or audit a page (the default when no command is given)
//! - `list-audits` - List the built-in audits
//! - `list-locales` - List locales with translated strings
//! - `print-config` - Print the resolved configuration

mod commands;

use clap::{Args, Parser, Subcommand};
use lighthouse_core::{LighthouseError, OutputMode};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Lighthouse - audit a web page and report on it
///
/// Runs collection and evaluation together, or separately with
/// --gather-mode and --audit-mode sharing an artifacts directory.
#[derive(Parser, Debug)]
#[command(name = "lighthouse")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Output listings in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(flatten)]
    pub run: RunArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options for a run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// URL of the page to audit
    pub url: Option<String>,

    /// Collect only, saving artifacts to PATH (default ./latest-run)
    #[arg(short = 'G', long, value_name = "PATH", num_args = 0..=1)]
    pub gather_mode: Option<Option<String>>,

    /// Audit saved artifacts from PATH (default ./latest-run)
    #[arg(short = 'A', long, value_name = "PATH", num_args = 0..=1)]
    pub audit_mode: Option<Option<String>>,

    /// Report format (json, html)
    #[arg(long)]
    pub output: Option<OutputMode>,

    /// Locale for report text
    #[arg(long)]
    pub locale: Option<String>,

    /// Throttling method (devtools, simulate, provided)
    #[arg(long, value_name = "METHOD")]
    pub throttling_method: Option<String>,

    /// Device to emulate (mobile, desktop)
    #[arg(long, value_name = "FACTOR")]
    pub form_factor: Option<String>,

    /// Only run these audits (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only_audits: Option<Vec<String>>,

    /// Skip these audits (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip_audits: Option<Vec<String>>,

    /// Only run these categories (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only_categories: Option<Vec<String>>,

    /// Milliseconds to wait for the page to load
    #[arg(long, value_name = "MS")]
    pub max_wait_for_load: Option<u64>,

    /// Extra request headers, as a JSON object or a path to one
    #[arg(long, value_name = "JSON|PATH")]
    pub extra_headers: Option<String>,

    /// Where to write the report (default stdout)
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// TOML config file replacing the default config
    #[arg(long)]
    pub config_path: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect and/or audit a page
    Run(RunArgs),

    /// List the built-in audits
    ListAudits,

    /// List locales with translated strings
    ListLocales,

    /// Print the configuration a run with these options would use
    PrintConfig(RunArgs),
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LighthouseError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Run(args)) => cmd_run(&args).await,
        Some(Commands::ListAudits) => cmd_list_audits(json_mode),
        Some(Commands::ListLocales) => cmd_list_locales(json_mode),
        Some(Commands::PrintConfig(args)) => cmd_print_config(&args).await,
        None => {
            // No subcommand - run with the top-level options
            cmd_run(&cli.run).await
        }
    }
}
