//! Reverse proxy provisioning
//!
//! The stack sits behind a shared Traefik instance: a docker network
//! joins every deployed stack to it, and in prod the proxy itself is
//! provisioned from a versioned checkout next to the project. The app
//! config's `proxy_mode` flag follows the deploy target.

use crate::config::EnvConfig;
use crate::error::{SlipwayError, SlipwayResult};
use crate::sizing::conf;
use crate::ui::{self, UiContext};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Shared docker network joining stacks to the proxy
const PROXY_NETWORK: &str = "traefik";

/// Configure everything the reverse proxy needs for this deployment.
pub async fn configure(config: &EnvConfig, ctx: &UiContext) -> SlipwayResult<()> {
    ensure_network(ctx).await?;

    if config.target.is_prod() {
        ensure_proxy_container(config, ctx).await?;
    }

    // Tell the app whether it is running behind the proxy
    ui::step_info(ctx, "Verifying app proxy config");
    let value = if config.target.is_prod() { "True" } else { "False" };
    match conf::set_options(&config.app_conf_file(), &[("proxy_mode", value.to_string())]) {
        Ok(()) => ui::step_ok(ctx, "App proxy config has been updated"),
        // A missing conf file is not worth failing the whole run over
        Err(e) => ui::step_warn(ctx, &format!("Could not update app proxy config: {e}")),
    }

    Ok(())
}

/// Create the shared proxy network if it does not exist yet.
async fn ensure_network(ctx: &UiContext) -> SlipwayResult<()> {
    ui::step_info(ctx, "Verifying proxy network");

    let output = exec(None, &["network", "ls", "--format", "{{.Name}}"]).await?;
    if !output.status.success() {
        return Err(SlipwayError::ProxyProvision(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let names = String::from_utf8_lossy(&output.stdout);
    if names.lines().any(|n| n.trim() == PROXY_NETWORK) {
        ui::step_ok(ctx, "Proxy network already exists");
        return Ok(());
    }

    let created = exec(None, &["network", "create", PROXY_NETWORK]).await?;
    if !created.status.success() {
        return Err(SlipwayError::ProxyProvision(
            String::from_utf8_lossy(&created.stderr).to_string(),
        ));
    }
    ui::step_ok(ctx, "Proxy network created successfully");
    Ok(())
}

/// Make sure the prod proxy checkout matches the expected version and
/// its container is running.
async fn ensure_proxy_container(config: &EnvConfig, ctx: &UiContext) -> SlipwayResult<()> {
    ui::step_info(ctx, "Verifying proxy container");

    let base = config.proxy_base_dir();
    let checkout = base.join(PROXY_NETWORK);

    let current = checkout_version(&checkout);
    if needs_refresh(current.as_deref(), &config.proxy_version) {
        ui::step_warn(ctx, "Proxy version is not up to date, refreshing the checkout");
        remove_previous_proxy(&checkout, ctx).await;

        let cloned = exec_in(
            &base,
            "git",
            &[
                "clone",
                "--depth=1",
                &config.proxy_repo,
                PROXY_NETWORK,
            ],
        )
        .await?;
        if !cloned.status.success() {
            return Err(SlipwayError::ProxyProvision(format!(
                "git clone failed: {}",
                String::from_utf8_lossy(&cloned.stderr)
            )));
        }
        ui::step_ok(ctx, "Proxy checkout has been updated");
    } else {
        ui::step_ok(ctx, "Proxy checkout is up to date");
    }

    // Start the proxy if nothing by that name is running
    let running = exec(
        None,
        &["ps", "--filter", "name=traefik", "--format", "{{.Names}}"],
    )
    .await?;
    if running.stdout.iter().all(|b| b.is_ascii_whitespace()) {
        ui::step_info(ctx, "Proxy container is not running, starting it");
        let started = exec_in(&checkout, "docker", &["compose", "-p", PROXY_NETWORK, "up", "-d"])
            .await?;
        if !started.status.success() {
            return Err(SlipwayError::ProxyProvision(
                String::from_utf8_lossy(&started.stderr).to_string(),
            ));
        }
        ui::step_ok(ctx, "Proxy container has been started");
    } else {
        ui::step_ok(ctx, "Proxy container is running");
    }

    Ok(())
}

/// Stop and remove the previous proxy container, volumes, image and
/// checkout. Absence of any of them is expected on first provisioning.
async fn remove_previous_proxy(checkout: &Path, ctx: &UiContext) {
    for (label, args) in [
        ("container", vec!["ps", "-f", "name=traefik", "-q"]),
        ("stopped container", vec!["ps", "-a", "-f", "name=traefik", "-q"]),
        ("image", vec!["images", "-f", "reference=traefik", "-q"]),
    ] {
        let ids = match exec(None, &args).await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
            Err(e) => {
                warn!("Could not query proxy {}: {}", label, e);
                continue;
            }
        };
        if ids.is_empty() {
            debug!("No previous proxy {} found", label);
            continue;
        }

        let mut full: Vec<&str> = match label {
            "container" => vec!["stop"],
            "stopped container" => vec!["rm", "-v"],
            _ => vec!["rmi"],
        };
        full.extend(ids.lines());

        match exec(None, &full).await {
            Ok(output) if output.status.success() => {
                ui::step_ok(ctx, &format!("Previous proxy {label} has been removed"));
            }
            _ => ui::step_warn(ctx, &format!("No previous proxy {label} was removed")),
        }
    }

    if checkout.exists() {
        if let Err(e) = std::fs::remove_dir_all(checkout) {
            warn!("Could not remove previous proxy checkout: {}", e);
        }
    }
}

/// Version recorded in the checkout's .env file, if any
fn checkout_version(checkout: &Path) -> Option<String> {
    let env_path = checkout.join(".env");
    let iter = dotenvy::from_path_iter(&env_path).ok()?;
    for item in iter {
        let (key, value) = item.ok()?;
        if key == "VERSION" {
            return Some(value);
        }
    }
    None
}

/// The checkout is refreshed when it has no recorded version or the
/// recorded version differs from the expected one.
fn needs_refresh(current: Option<&str>, expected: &str) -> bool {
    current != Some(expected)
}

async fn exec(dir: Option<&Path>, args: &[&str]) -> SlipwayResult<std::process::Output> {
    debug!("Executing: docker {:?}", args);

    let mut cmd = Command::new("docker");
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.output()
        .await
        .map_err(|e| SlipwayError::command_failed(format!("docker {args:?}"), e))
}

async fn exec_in(dir: &Path, program: &str, args: &[&str]) -> SlipwayResult<std::process::Output> {
    debug!("Executing in {}: {} {:?}", dir.display(), program, args);

    Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SlipwayError::command_failed(format!("{program} {args:?}"), e))
}
