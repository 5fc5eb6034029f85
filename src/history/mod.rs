//! Deployment run records
//!
//! Every deploy run leaves a JSON record in the user state directory,
//! so `slipway history` can answer "what ran here, when, and did it
//! work". Records are additive telemetry; nothing reads them back
//! during planning.

use crate::config;
use crate::error::{SlipwayError, SlipwayResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// How a deployment run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

/// One recorded deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRecord {
    /// Unique run ID
    pub id: Uuid,

    /// Deploy target the run was executed against
    pub target: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,

    /// Final outcome
    pub outcome: RunOutcome,

    /// Labels of the steps that completed, in execution order
    pub steps: Vec<String>,
}

impl DeployRecord {
    pub fn new(
        target: String,
        started_at: DateTime<Utc>,
        duration_secs: f64,
        outcome: RunOutcome,
        steps: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            started_at,
            duration_secs,
            outcome,
            steps,
        }
    }

    /// Get record file path
    pub fn file_path(&self) -> PathBuf {
        config::history_dir().join(format!(
            "{}-{}.json",
            self.started_at.format("%Y%m%dT%H%M%S"),
            self.id
        ))
    }

    /// Save record to file
    pub async fn save(&self) -> SlipwayResult<()> {
        let path = self.file_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SlipwayError::io("creating history directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .map_err(|e| SlipwayError::io(format!("writing run record {}", path.display()), e))?;

        Ok(())
    }

    /// List all recorded runs, newest first
    pub async fn list_all() -> SlipwayResult<Vec<DeployRecord>> {
        let dir = config::history_dir();

        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut records = vec![];
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| SlipwayError::io("reading history directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SlipwayError::io("reading history entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = fs::read_to_string(&path).await.ok();
                if let Some(content) = content {
                    if let Ok(record) = serde_json::from_str::<DeployRecord>(&content) {
                        records.push(record);
                    }
                }
            }
        }

        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(records)
    }
}
