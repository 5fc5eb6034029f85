//! Deploy command - run a full deployment

use crate::cache::{load_cache, PendingCache};
use crate::cli::args::DeployArgs;
use crate::config::{self, EnvConfig};
use crate::detect::{file_mtime, needs_rebuild};
use crate::error::{SlipwayError, SlipwayResult};
use crate::history::{DeployRecord, RunOutcome};
use crate::plan::execute::{execute_steps, run_module_phase};
use crate::plan::Step;
use crate::stack::{health, ComposeRuntime, DatabaseInspector, PostgresInspector, StackRuntime};
use crate::ui::{self, UiContext};
use chrono::Utc;
use futures_util::future::try_join;
use std::path::Path;
use std::time::Instant;
use tracing::warn;

/// Lines of compose logs surfaced when a launch fails
const FAILURE_LOG_LINES: u32 = 30;
/// Lines of the app server log surfaced when a launch fails
const APP_LOG_LINES: usize = 50;

/// Execute the deploy command
pub async fn execute(
    args: DeployArgs,
    base_dir: &Path,
    env_file: Option<&Path>,
) -> SlipwayResult<()> {
    let start = Instant::now();
    let started_at = Utc::now();
    let ctx = UiContext::detect();

    ui::intro(&ctx, "Slipway Deploy");

    let mut cfg = config::load(base_dir, env_file)?;
    apply_overrides(&mut cfg, &args);

    review_environment(&cfg, &ctx);
    cfg.validate()?;

    stage_requirements(&cfg, &ctx)?;

    let runtime = ComposeRuntime::new(&cfg);
    let inspector = PostgresInspector::new(&cfg);

    let result = run(&cfg, &runtime, &inspector, &ctx, args.skip_health).await;

    // Record the run regardless of outcome
    let (outcome, steps) = match &result {
        Ok(steps) => (RunOutcome::Success, steps.clone()),
        Err(_) => (RunOutcome::Failed, vec![]),
    };
    let record = DeployRecord::new(
        cfg.target.to_string(),
        started_at,
        start.elapsed().as_secs_f64(),
        outcome,
        steps,
    );
    if let Err(e) = record.save().await {
        warn!("Could not save run record: {}", e);
    }

    match result {
        Ok(_) => {
            ui::outro_success(
                &ctx,
                &format!("Total time: {:.2} seconds", start.elapsed().as_secs_f64()),
            );
            Ok(())
        }
        Err(e) => {
            if launch_related(&e) {
                print_failure_logs(&cfg, &runtime, &ctx).await;
            }
            ui::outro_error(&ctx, "Aborting deployment");
            Err(e)
        }
    }
}

/// CLI flags override what the environment configured
fn apply_overrides(cfg: &mut EnvConfig, args: &DeployArgs) {
    cfg.force_rebuild |= args.force_rebuild;
    cfg.force_update |= args.force_update;
    if !args.update.is_empty() {
        cfg.update_module_list = Some(args.update.clone());
    }
}

/// The deployment itself: stop, proxy, build, module phase, health.
async fn run(
    cfg: &EnvConfig,
    runtime: &ComposeRuntime,
    inspector: &PostgresInspector,
    ctx: &UiContext,
    skip_health: bool,
) -> SlipwayResult<Vec<String>> {
    let mut executed = Vec::new();

    ui::section(ctx, "STOPPING RUNNING CONTAINERS");
    ui::step_info(ctx, "Stopping running containers");
    runtime.stop().await?;
    ui::step_ok(ctx, "Running containers were successfully stopped");

    ui::section(ctx, "CONFIGURING REVERSE PROXY");
    crate::stack::proxy::configure(cfg, ctx).await?;

    ui::section(ctx, "APPLYING CONFIGURATION CHANGES");
    executed.extend(build_phase(cfg, runtime, ctx).await?);

    if cfg.auto_install_modules || cfg.auto_update_modules {
        ui::section(ctx, "UPDATING DATABASES AND INSTALLING MODULES");
        executed.extend(run_module_phase(cfg, runtime, inspector, ctx).await?);
    } else {
        ui::section(ctx, "DEPLOYING ENVIRONMENT");
        executed.extend(execute_steps(runtime, &[Step::Launch], ctx).await?);

        // A fresh dev environment still gets its first database
        if cfg.target == config::DeployTarget::Dev && cfg.auto_create_database {
            let databases = inspector.list_databases().await?;
            if databases.is_empty() {
                executed.extend(execute_steps(runtime, &[Step::CreateDatabase], ctx).await?);
            }
        }
    }

    if !skip_health {
        ui::section(ctx, "VERIFYING SERVICE STATE");
        verify_health(cfg, ctx).await?;
    }

    Ok(executed)
}

/// Decide on and perform the image rebuild, committing the build-input
/// cache only after a successful build.
async fn build_phase(
    cfg: &EnvConfig,
    runtime: &ComposeRuntime,
    ctx: &UiContext,
) -> SlipwayResult<Vec<String>> {
    let env_mtime = file_mtime(&cfg.env_file())?;
    let dockerfile_mtime = file_mtime(&cfg.dockerfile())?;

    let cached = load_cache(&cfg.build_cache_file());
    let decision = needs_rebuild(env_mtime, dockerfile_mtime, cached, cfg.force_rebuild);

    if !decision.rebuild {
        ui::step_ok(ctx, "No changes detected in build inputs, skipping image build");
        return Ok(vec![]);
    }

    ui::step_info(ctx, "Detected changes in build inputs, building images");
    let pending = PendingCache::new(cfg.build_cache_file(), decision.cache);

    let pb = ui::spinner(ctx, "Building images...");
    let executed = execute_steps(runtime, &[Step::Build], ctx).await;
    pb.finish_and_clear();
    let executed = executed?;

    // Build succeeded; only now record the new input signature
    pending.commit()?;
    Ok(executed)
}

/// Poll the app until it answers. In prod the internal and the public
/// URL are verified together.
async fn verify_health(cfg: &EnvConfig, ctx: &UiContext) -> SlipwayResult<()> {
    let internal = cfg.internal_url();
    ui::step_info(ctx, &format!("Checking app state on: {internal}"));

    match (cfg.target.is_prod(), cfg.public_url()) {
        (true, Some(public)) => {
            ui::step_info(ctx, &format!("Checking app state on: {public}"));
            try_join(
                health::wait_for_service(&internal),
                health::wait_for_service(&public),
            )
            .await?;
            ui::step_ok(ctx, &format!("App is answering on {internal} and {public}"));
        }
        _ => {
            health::wait_for_service(&internal).await?;
            ui::step_ok(ctx, &format!("App is answering on {internal}"));
        }
    }
    Ok(())
}

/// Make sure the build context has a requirements file: the image
/// build expects one even when the addons ship none.
fn stage_requirements(cfg: &EnvConfig, ctx: &UiContext) -> SlipwayResult<()> {
    let destination = cfg.staged_addons_dir().join("requirements.txt");

    if cfg.addons_setting != "./addons" {
        let source = cfg.addons_dir().join("requirements.txt");

        if !source.exists() {
            ui::step_warn(
                ctx,
                &format!(
                    "Requirements file not found at {}, creating an empty file",
                    source.display()
                ),
            );
            std::fs::write(&source, "").map_err(|e| {
                SlipwayError::io(format!("creating {}", source.display()), e)
            })?;
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SlipwayError::io(format!("creating {}", parent.display()), e))?;
        }
        std::fs::copy(&source, &destination).map_err(|e| {
            SlipwayError::io(
                format!("copying {} to {}", source.display(), destination.display()),
                e,
            )
        })?;
    }

    if !destination.exists() {
        ui::step_warn(ctx, "Requirements file not found, creating an empty file");
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SlipwayError::io(format!("creating {}", parent.display()), e))?;
        }
        std::fs::write(&destination, "")
            .map_err(|e| SlipwayError::io(format!("creating {}", destination.display()), e))?;
    }

    Ok(())
}

/// Print the effective configuration before validating it.
fn review_environment(cfg: &EnvConfig, ctx: &UiContext) {
    ui::section(ctx, "VERIFYING ENVIRONMENT VARIABLES");

    ui::key_value(ctx, "Project name", &cfg.project_name);
    ui::key_value(ctx, "Deployment target", cfg.target.as_str());
    ui::key_value(ctx, "App version", &cfg.app_version);
    ui::key_value(ctx, "Postgres version", &cfg.postgres_version);
    ui::key_value(ctx, "Exposed port", &cfg.exposed_port.to_string());
    ui::key_value(ctx, "Internal port", &cfg.internal_port.to_string());
    ui::key_value(ctx, "Domain", cfg.domain.as_deref().unwrap_or("-"));
    ui::key_value(ctx, "Log path", &cfg.log_dir);
    ui::key_value(ctx, "Config path", &cfg.conf_dir);
    ui::key_value(ctx, "Addons path", &cfg.addons_dir().display().to_string());
    ui::key_value(
        ctx,
        "Auto install modules",
        &cfg.auto_install_modules.to_string(),
    );
    ui::key_value(
        ctx,
        "Auto update modules",
        &cfg.auto_update_modules.to_string(),
    );
    ui::key_value(ctx, "Force update", &cfg.force_update.to_string());
    ui::key_value(
        ctx,
        "Update module list",
        &cfg.update_module_list
            .as_ref()
            .map(|l| l.join(","))
            .unwrap_or_else(|| "-".to_string()),
    );
    ui::key_value(ctx, "Force rebuild", &cfg.force_rebuild.to_string());
    ui::key_value(
        ctx,
        "Auto create database",
        &cfg.auto_create_database.to_string(),
    );
}

fn launch_related(e: &SlipwayError) -> bool {
    matches!(
        e,
        SlipwayError::LaunchFailed(_)
            | SlipwayError::BuildFailed(_)
            | SlipwayError::ModuleOperation { .. }
            | SlipwayError::ServiceUnavailable { .. }
    )
}

/// Surface the compose logs and the app server log after a failure.
async fn print_failure_logs(cfg: &EnvConfig, runtime: &ComposeRuntime, ctx: &UiContext) {
    ui::section(ctx, "FAILURE LOGS");

    match runtime.tail_logs(FAILURE_LOG_LINES).await {
        Ok(logs) if !logs.trim().is_empty() => {
            ui::step_info(ctx, "Container logs:");
            for line in logs.lines() {
                ui::step_warn(ctx, line);
            }
        }
        Ok(_) => ui::step_warn(ctx, "No container logs available"),
        Err(e) => ui::step_error(ctx, &format!("Error getting container logs: {e}")),
    }

    let log_path = cfg.app_log_file();
    match std::fs::read_to_string(&log_path) {
        Ok(content) => {
            ui::step_info(ctx, "App server logs:");
            let lines: Vec<&str> = content.lines().collect();
            let tail = lines.len().saturating_sub(APP_LOG_LINES);
            for line in &lines[tail..] {
                ui::step_warn(ctx, line);
            }
        }
        Err(_) => ui::step_warn(
            ctx,
            &format!("App log file not found at path: {}", log_path.display()),
        ),
    }
}
