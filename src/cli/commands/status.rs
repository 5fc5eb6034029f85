//! Status command - probe the running stack once

use crate::config;
use crate::error::{SlipwayError, SlipwayResult};
use crate::stack::health;
use crate::ui::{self, UiContext};
use std::path::Path;

/// Execute the status command
pub async fn execute(base_dir: &Path, env_file: Option<&Path>) -> SlipwayResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Slipway Status");

    let cfg = config::load(base_dir, env_file)?;

    let mut down = None;
    let internal = cfg.internal_url();
    if health::probe_once(&internal).await? {
        ui::step_ok(&ctx, &format!("App answering on {internal}"));
    } else {
        ui::step_error(&ctx, &format!("No answer on {internal}"));
        down = Some(internal.clone());
    }

    if cfg.target.is_prod() {
        if let Some(public) = cfg.public_url() {
            if health::probe_once(&public).await? {
                ui::step_ok(&ctx, &format!("App answering on {public}"));
            } else {
                ui::step_error(&ctx, &format!("No answer on {public}"));
                down = Some(public);
            }
        }
    }

    match down {
        None => {
            ui::outro_success(&ctx, "Stack is up");
            Ok(())
        }
        Some(url) => {
            ui::outro_error(&ctx, "Stack is not answering");
            Err(SlipwayError::ServiceUnavailable { url, seconds: 0.0 })
        }
    }
}
