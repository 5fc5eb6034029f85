//! Rebuild decision from build-input timestamps
//!
//! Images are rebuilt when the environment file or the image definition
//! file changed since the last successful build, when the cache is
//! missing or unreadable, or when a rebuild is forced. Fail-open: an
//! unreadable cache means rebuild, never "no work".

use crate::cache::BuildInputCache;
use crate::error::{SlipwayError, SlipwayResult};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Outcome of the rebuild decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildDecision {
    pub rebuild: bool,
    /// Candidate new cache holding the current mtimes. Persisted by the
    /// caller only after the build succeeded.
    pub cache: BuildInputCache,
}

/// Modification time of a file as fractional seconds since the epoch,
/// matching the numbers persisted in the cache file.
pub fn file_mtime(path: &Path) -> SlipwayResult<f64> {
    let meta = std::fs::metadata(path)
        .map_err(|e| SlipwayError::io(format!("reading metadata of {}", path.display()), e))?;
    let modified = meta
        .modified()
        .map_err(|e| SlipwayError::io(format!("reading mtime of {}", path.display()), e))?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SlipwayError::Internal(format!("mtime before epoch: {e}")))?;
    Ok(since_epoch.as_secs_f64())
}

/// Decide whether images must be rebuilt.
pub fn needs_rebuild(
    env_file_mtime: f64,
    dockerfile_mtime: f64,
    cached: Option<BuildInputCache>,
    force: bool,
) -> BuildDecision {
    let cache = BuildInputCache {
        env_file_modified_time: env_file_mtime,
        dockerfile_file_modified_time: dockerfile_mtime,
    };

    let rebuild = force
        || match cached {
            None => true,
            Some(prev) => {
                prev.env_file_modified_time != env_file_mtime
                    || prev.dockerfile_file_modified_time != dockerfile_mtime
            }
        };

    BuildDecision { rebuild, cache }
}
