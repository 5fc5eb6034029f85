//! Live database-engine queries
//!
//! Implements [`DatabaseInspector`] by running `pg_isready` and `psql`
//! inside the database container. The engine may still be starting
//! when we first ask, so queries retry on a fixed interval up to a
//! fixed budget, then degrade to an empty result with a warning --
//! over-triggering installs is preferred to silently skipping them.

use crate::config::EnvConfig;
use crate::error::{SlipwayError, SlipwayResult};
use crate::stack::runtime::DatabaseInspector;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Retry budget for engine queries
const MAX_TRIES: u32 = 10;
/// Fixed sleep between retries, no backoff growth
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Databases that belong to the engine, never deployment targets
const SYSTEM_DATABASES: &[&str] = &["postgres", "template0", "template1", "Name"];

pub struct PostgresInspector {
    container: String,
    user: String,
}

impl PostgresInspector {
    pub fn new(config: &EnvConfig) -> Self {
        Self {
            container: config.db_container(),
            user: config.db_user.clone(),
        }
    }

    async fn exec(&self, args: &[&str]) -> SlipwayResult<std::process::Output> {
        debug!("Executing: docker {:?}", args);

        Command::new("docker")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SlipwayError::command_failed(format!("docker {args:?}"), e))
    }

    /// One attempt at the ready-check + database listing
    async fn try_list(&self) -> SlipwayResult<Vec<String>> {
        let ready = self
            .exec(&["exec", &self.container, "pg_isready", "-U", &self.user])
            .await?;

        let ready_out = String::from_utf8_lossy(&ready.stdout);
        if !ready.status.success() || !ready_out.contains("accepting connections") {
            return Err(SlipwayError::DatabaseQuery(format!(
                "engine not accepting connections: {}",
                String::from_utf8_lossy(&ready.stderr)
            )));
        }

        let list = self
            .exec(&["exec", &self.container, "psql", "-U", &self.user, "-l", "-A"])
            .await?;

        if !list.status.success() {
            return Err(SlipwayError::DatabaseQuery(
                String::from_utf8_lossy(&list.stderr).to_string(),
            ));
        }

        Ok(parse_database_list(&String::from_utf8_lossy(&list.stdout)))
    }
}

/// Extract user database names from unaligned `psql -l -A` output
fn parse_database_list(stdout: &str) -> Vec<String> {
    let mut databases = Vec::new();

    for line in stdout.lines() {
        if !line.contains('|') {
            continue;
        }
        let name = line.split('|').next().unwrap_or("").trim();
        if name.is_empty() || name.contains('=') || SYSTEM_DATABASES.contains(&name) {
            continue;
        }
        databases.push(name.to_string());
    }

    databases
}

/// Extract module names from `psql -t` output
fn parse_installed_modules(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl DatabaseInspector for PostgresInspector {
    async fn list_databases(&self) -> SlipwayResult<Vec<String>> {
        for attempt in 1..=MAX_TRIES {
            match self.try_list().await {
                Ok(databases) => {
                    debug!("Engine reports {} user databases", databases.len());
                    return Ok(databases);
                }
                Err(e) => {
                    debug!("Database listing attempt {}/{} failed: {}", attempt, MAX_TRIES, e);
                    if attempt < MAX_TRIES {
                        tokio::time::sleep(RETRY_INTERVAL).await;
                    }
                }
            }
        }

        warn!(
            "Failed listing databases after {} attempts; treating environment as having none",
            MAX_TRIES
        );
        Ok(Vec::new())
    }

    async fn installed_modules(&self, database: &str) -> SlipwayResult<BTreeSet<String>> {
        let query = "SELECT name FROM app_modules WHERE state='installed';";

        for attempt in 1..=MAX_TRIES {
            let output = self
                .exec(&[
                    "exec",
                    &self.container,
                    "psql",
                    "-U",
                    &self.user,
                    "-d",
                    database,
                    "-t",
                    "-c",
                    query,
                ])
                .await?;

            if output.status.success() {
                return Ok(parse_installed_modules(&String::from_utf8_lossy(
                    &output.stdout,
                )));
            }

            debug!(
                "Installed-module query attempt {}/{} failed on {}: {}",
                attempt,
                MAX_TRIES,
                database,
                String::from_utf8_lossy(&output.stderr)
            );
            if attempt < MAX_TRIES {
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }

        warn!(
            "Could not query installed modules on {}; treating the database as empty",
            database
        );
        Ok(BTreeSet::new())
    }
}
