//! Slipway - deployment orchestrator
//!
//! CLI entry point that dispatches to subcommands. Invoked without a
//! subcommand it runs a full deployment.

use clap::Parser;
use console::style;
use slipway::cli::args::DeployArgs;
use slipway::cli::{Cli, Commands};
use slipway::error::{SlipwayError, SlipwayResult};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SlipwayResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn (step output only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("slipway=warn"),
        1 => EnvFilter::new("slipway=info"),
        _ => EnvFilter::new("slipway=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let base_dir = match cli.project {
        Some(path) => path
            .canonicalize()
            .map_err(|e| SlipwayError::io(format!("resolving project path {}", path.display()), e))?,
        None => std::env::current_dir()
            .map_err(|e| SlipwayError::io("getting current directory", e))?,
    };

    match cli.command.unwrap_or(Commands::Deploy(DeployArgs::default())) {
        Commands::Deploy(args) => {
            slipway::cli::commands::deploy(args, &base_dir, cli.env_file.as_deref()).await
        }
        Commands::AutoConfig(args) => slipway::cli::commands::auto_config(args, &base_dir).await,
        Commands::Status => {
            slipway::cli::commands::status(&base_dir, cli.env_file.as_deref()).await
        }
        Commands::History(args) => slipway::cli::commands::history(args).await,
    }
}
