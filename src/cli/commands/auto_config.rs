//! Auto-config command - size config files to the host's resources

use crate::cli::args::AutoConfigArgs;
use crate::error::SlipwayResult;
use crate::sizing::{self, ResourceProfile, Tuning};
use crate::ui::{self, UiContext};
use std::path::Path;

/// Execute the auto-config command
pub async fn execute(args: AutoConfigArgs, base_dir: &Path) -> SlipwayResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Slipway Auto-Config");

    let profile = ResourceProfile::detect()?;
    ui::key_value(&ctx, "CPUs", &profile.cpus.to_string());
    ui::key_value(
        &ctx,
        "Total RAM",
        &format!("{:.1} GB", profile.total_ram_bytes as f64 / 1e9),
    );

    let tuning = Tuning::compute(profile);
    sizing::review(&tuning, &ctx);

    if args.dry_run {
        ui::outro_success(&ctx, "Dry run, no files written");
        return Ok(());
    }

    sizing::apply(
        &tuning,
        &base_dir.join("config").join("app.conf"),
        &base_dir.join("config").join("postgresql.conf"),
        &ctx,
    )?;

    ui::outro_success(&ctx, "Configuration files updated");
    Ok(())
}
