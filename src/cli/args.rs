//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Slipway - deployment orchestrator for containerized app stacks
///
/// Runs the full deployment when invoked without a subcommand:
/// incremental image rebuilds, per-database module installs and
/// updates, and a final stack relaunch.
#[derive(Parser, Debug)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute (defaults to deploy)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Environment file path
    #[arg(long, global = true, env = "SLIPWAY_ENV_FILE")]
    pub env_file: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full deployment
    Deploy(DeployArgs),

    /// Size app and postgres config files to the host's resources
    AutoConfig(AutoConfigArgs),

    /// Probe the running stack for readiness
    Status,

    /// List recorded deployment runs
    History(HistoryArgs),
}

/// Arguments for the deploy command
#[derive(Parser, Debug, Default)]
pub struct DeployArgs {
    /// Rebuild images even when no build-input change was detected
    #[arg(long)]
    pub force_rebuild: bool,

    /// Append the force-update modifier to module update operations
    #[arg(long)]
    pub force_update: bool,

    /// Update exactly these modules, skipping change detection
    /// (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub update: Vec<String>,

    /// Skip the readiness verification after launch
    #[arg(long)]
    pub skip_health: bool,
}

/// Arguments for the auto-config command
#[derive(Parser, Debug)]
pub struct AutoConfigArgs {
    /// Print the computed values without writing config files
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Number of runs to show
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for the history command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}
