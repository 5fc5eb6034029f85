//! Integration tests for Slipway

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn slipway() -> Command {
        cargo_bin_cmd!("slipway")
    }

    #[test]
    fn help_displays() {
        slipway()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("deployment orchestrator"));
    }

    #[test]
    fn version_displays() {
        slipway()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("slipway"));
    }

    #[test]
    fn deploy_help_displays() {
        slipway()
            .args(["deploy", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force-rebuild"))
            .stdout(predicate::str::contains("--update"));
    }

    #[test]
    fn deploy_without_environment_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        slipway()
            .env_clear()
            .args(["--project"])
            .arg(temp.path())
            .arg("deploy")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Required variable"));
    }

    #[test]
    fn bare_invocation_is_deploy() {
        let temp = TempDir::new().unwrap();
        slipway()
            .env_clear()
            .args(["--project"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Required variable"));
    }

    #[test]
    fn explicit_missing_env_file_is_reported() {
        let temp = TempDir::new().unwrap();
        slipway()
            .env_clear()
            .args(["--project"])
            .arg(temp.path())
            .args(["--env-file", "/nonexistent/.env", "deploy"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Environment file not found"));
    }

    #[test]
    fn invalid_target_is_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".env"),
            "COMPOSE_PROJECT_NAME=t\nVERSION=1\nTRAEFIK_VERSION=3\nDEPLOY_TARGET=staging\n",
        )
        .unwrap();

        slipway()
            .env_clear()
            .args(["--project"])
            .arg(temp.path())
            .arg("deploy")
            .assert()
            .failure()
            .stderr(predicate::str::contains("'dev' or 'prod'"));
    }

    #[test]
    fn auto_config_dry_run_prints_values() {
        let temp = TempDir::new().unwrap();
        slipway()
            .args(["--project"])
            .arg(temp.path())
            .args(["auto-config", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("workers"))
            .stdout(predicate::str::contains("shared_buffers"));
    }

    #[test]
    fn history_runs_without_records() {
        slipway().arg("history").assert().success();
    }

    #[test]
    fn history_json_format() {
        slipway()
            .args(["history", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("["));
    }
}
