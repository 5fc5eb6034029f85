//! Compose-backed stack runtime
//!
//! Implements [`StackRuntime`] by shelling out to `docker compose` in
//! the project directory. Per-target behavior (proxy labels, exposure)
//! comes from an overlay file `labels/labels-<target>.yml` stacked on
//! top of `docker-compose.yml`.

use crate::config::EnvConfig;
use crate::error::{SlipwayError, SlipwayResult};
use crate::stack::health;
use crate::stack::runtime::StackRuntime;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Modifier appended to update operations when force-update is set;
/// makes the app server reload module assets unconditionally.
const FORCE_UPDATE_FLAG: &str = "--dev=all";

/// Field values posted to the app's first-run database-creation form
const BOOTSTRAP_DATABASE: &str = "master";
const BOOTSTRAP_MASTER_PASSWORD: &str = "master";

pub struct ComposeRuntime {
    config: EnvConfig,
}

impl ComposeRuntime {
    pub fn new(config: &EnvConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Overlay file selecting per-target labels
    fn label_file(&self) -> String {
        format!("labels/labels-{}.yml", self.config.target)
    }

    /// Base compose argument vector with the target overlay applied
    fn compose_args(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "-f".to_string(),
            "docker-compose.yml".to_string(),
            "-f".to_string(),
            self.label_file(),
        ]
    }

    /// Execute a docker command in the project directory
    async fn exec(&self, args: &[String]) -> SlipwayResult<std::process::Output> {
        debug!("Executing: docker {:?}", args);

        Command::new("docker")
            .args(args)
            .current_dir(&self.config.base_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SlipwayError::command_failed(format!("docker {args:?}"), e))
    }

    /// Run a one-off app container with the given server arguments
    async fn run_one_off(&self, database: &str, server_args: &[String]) -> SlipwayResult<()> {
        let mut args = self.compose_args();
        args.extend(["run".to_string(), "--rm".to_string(), "app".to_string()]);
        args.push("-d".to_string());
        args.push(database.to_string());
        args.extend(server_args.iter().cloned());
        args.push("--stop-after-init".to_string());

        let output = self.exec(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::ModuleOperation {
                database: database.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

#[async_trait]
impl StackRuntime for ComposeRuntime {
    async fn stop(&self) -> SlipwayResult<()> {
        let output = self.exec(&["compose".to_string(), "down".to_string()]).await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::StopFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    async fn build(&self) -> SlipwayResult<()> {
        let mut args = self.compose_args();
        args.push("build".to_string());

        let output = self.exec(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::BuildFailed(format!(
                "{}\n{}",
                String::from_utf8_lossy(&output.stderr),
                String::from_utf8_lossy(&output.stdout)
            )))
        }
    }

    async fn launch(&self) -> SlipwayResult<()> {
        let mut args = self.compose_args();
        args.extend(["up".to_string(), "-d".to_string()]);

        let output = self.exec(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::LaunchFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    async fn launch_database(&self) -> SlipwayResult<()> {
        let output = self
            .exec(&[
                "compose".to_string(),
                "up".to_string(),
                "-d".to_string(),
                "db".to_string(),
            ])
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SlipwayError::LaunchFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    async fn create_database(&self) -> SlipwayResult<()> {
        // The app must answer before the creation form exists
        health::wait_for_service(&self.config.internal_url()).await?;

        let url = format!("{}/web/database/create", self.config.internal_url());
        info!("Posting database-creation form to {}", url);

        let form: Vec<(&str, &str)> = vec![
            ("master_pwd", BOOTSTRAP_MASTER_PASSWORD),
            ("name", BOOTSTRAP_DATABASE),
            ("login", BOOTSTRAP_DATABASE),
            ("password", BOOTSTRAP_MASTER_PASSWORD),
            ("lang", "en_US"),
            ("country_code", "us"),
        ];

        tokio::task::spawn_blocking(move || {
            ureq::post(&url)
                .send_form(form)
                .map(|_| ())
                .map_err(|e| SlipwayError::DatabaseCreate(e.to_string()))
        })
        .await
        .map_err(|e| SlipwayError::Internal(format!("database-creation task: {e}")))?
    }

    async fn install_modules(&self, database: &str, modules: &[String]) -> SlipwayResult<()> {
        self.run_one_off(database, &["-i".to_string(), modules.join(",")])
            .await
    }

    async fn update_modules(
        &self,
        database: &str,
        modules: &[String],
        force: bool,
    ) -> SlipwayResult<()> {
        let mut server_args = vec!["-u".to_string(), modules.join(",")];
        if force {
            server_args.push(FORCE_UPDATE_FLAG.to_string());
        }
        self.run_one_off(database, &server_args).await
    }

    async fn tail_logs(&self, lines: u32) -> SlipwayResult<String> {
        let mut args = self.compose_args();
        args.extend(["logs".to_string(), format!("--tail={lines}")]);

        let output = self.exec(&args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployTarget;
    use std::path::PathBuf;

    fn runtime(target: DeployTarget) -> ComposeRuntime {
        let config = EnvConfig {
            project_name: "acme".to_string(),
            stack_version: "1.0".to_string(),
            proxy_version: "3.1".to_string(),
            proxy_repo: "https://git.example.com/proxy.git".to_string(),
            target,
            app_version: "18".to_string(),
            postgres_version: "16".to_string(),
            db_user: "app".to_string(),
            exposed_port: 8069,
            internal_port: 8069,
            log_dir: "./log".to_string(),
            conf_dir: "./config".to_string(),
            addons_setting: "./addons".to_string(),
            domain: None,
            auto_install_modules: true,
            auto_update_modules: true,
            update_module_list: None,
            force_update: false,
            force_rebuild: false,
            auto_create_database: true,
            base_dir: PathBuf::from("/srv/stack"),
        };
        ComposeRuntime::new(&config)
    }

    #[test]
    fn label_file_follows_target() {
        assert_eq!(runtime(DeployTarget::Dev).label_file(), "labels/labels-dev.yml");
        assert_eq!(
            runtime(DeployTarget::Prod).label_file(),
            "labels/labels-prod.yml"
        );
    }

    #[test]
    fn compose_args_stack_overlay() {
        let args = runtime(DeployTarget::Dev).compose_args();
        assert_eq!(
            args,
            vec![
                "compose",
                "-f",
                "docker-compose.yml",
                "-f",
                "labels/labels-dev.yml"
            ]
        );
    }
}
