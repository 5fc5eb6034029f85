//! History command - list recorded deployment runs

use crate::cli::args::{HistoryArgs, OutputFormat};
use crate::error::SlipwayResult;
use crate::history::{DeployRecord, RunOutcome};
use console::style;

/// Execute the history command
pub async fn execute(args: HistoryArgs) -> SlipwayResult<()> {
    let records = DeployRecord::list_all().await?;
    let shown: Vec<&DeployRecord> = records.iter().take(args.limit).collect();

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        OutputFormat::Table => {
            if shown.is_empty() {
                println!("No recorded deployment runs");
                return Ok(());
            }

            println!(
                "{:<22} {:<6} {:<9} {:>10}  {}",
                style("STARTED").bold(),
                style("TARGET").bold(),
                style("OUTCOME").bold(),
                style("DURATION").bold(),
                style("STEPS").bold()
            );
            for record in shown {
                let outcome = match record.outcome {
                    RunOutcome::Success => style("success").green(),
                    RunOutcome::Failed => style("failed").red(),
                };
                println!(
                    "{:<22} {:<6} {:<9} {:>9.1}s  {}",
                    record.started_at.format("%Y-%m-%d %H:%M:%S"),
                    record.target,
                    outcome,
                    record.duration_secs,
                    record.steps.len()
                );
            }
        }
    }

    Ok(())
}
