//! HTTP readiness probing
//!
//! Fixed attempt count times fixed sleep interval, so the worst-case
//! wait is deterministic. The probe accepts any response below 500;
//! an app answering its login redirect counts as ready.

use crate::error::{SlipwayError, SlipwayResult};
use std::time::Duration;
use tracing::debug;

/// Probe attempts before giving up
pub const MAX_ATTEMPTS: u32 = 20;
/// Fixed sleep between attempts
pub const ATTEMPT_INTERVAL: Duration = Duration::from_millis(500);

/// One HEAD probe. Blocking; callers wrap in `spawn_blocking`.
fn probe(url: &str) -> bool {
    match ureq::head(url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => code < 500,
        Err(e) => {
            debug!("Probe of {} failed: {}", url, e);
            false
        }
    }
}

/// Wait until the service answers on `url`, or fail after the fixed
/// attempt budget.
pub async fn wait_for_service(url: &str) -> SlipwayResult<()> {
    for attempt in 1..=MAX_ATTEMPTS {
        let probe_url = url.to_string();
        let ready = tokio::task::spawn_blocking(move || probe(&probe_url))
            .await
            .map_err(|e| SlipwayError::Internal(format!("health probe task: {e}")))?;

        if ready {
            debug!("Service ready on {} (attempt {})", url, attempt);
            return Ok(());
        }

        tokio::time::sleep(ATTEMPT_INTERVAL).await;
    }

    Err(SlipwayError::ServiceUnavailable {
        url: url.to_string(),
        seconds: MAX_ATTEMPTS as f64 * ATTEMPT_INTERVAL.as_secs_f64(),
    })
}

/// Probe once without retrying, for the status command.
pub async fn probe_once(url: &str) -> SlipwayResult<bool> {
    let probe_url = url.to_string();
    tokio::task::spawn_blocking(move || probe(&probe_url))
        .await
        .map_err(|e| SlipwayError::Internal(format!("health probe task: {e}")))
}
