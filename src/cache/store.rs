//! Persisted change caches
//!
//! Two JSON files under `<project>/cache/` record the last successfully
//! deployed state: `config_cache.json` (build-input mtimes) and
//! `addons_cache.json` (module content fingerprints). Loading fails
//! soft -- a missing or corrupt file reads as `None` and the caller
//! treats the run as a first run. Writes go through a temp file and
//! rename so a crash never leaves a truncated cache behind.
//!
//! There is no cross-process locking; a single non-overlapping
//! invocation per host is assumed.

use crate::error::{SlipwayError, SlipwayResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Cached metadata for one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub content_hash: String,
}

/// Module name -> last deployed fingerprint
pub type ModuleCache = BTreeMap<String, ModuleEntry>;

/// Build-input signature: mtimes of the files feeding the image build
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildInputCache {
    pub env_file_modified_time: f64,
    pub dockerfile_file_modified_time: f64,
}

/// Read a cache file. Any read or parse failure is demoted to a warning
/// and reads as "never seen".
pub fn load_cache<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "Error reading cache file {}: {}. A new cache file will be created.",
                path.display(),
                e
            );
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                "Error parsing cache file {}: {}. A new cache file will be created.",
                path.display(),
                e
            );
            None
        }
    }
}

/// Replace a cache file in full, creating the containing directory if
/// absent. Writes to a sibling temp file first, then renames over the
/// target so readers never observe a partial write.
pub fn write_cache<T: Serialize>(path: &Path, value: &T) -> SlipwayResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SlipwayError::CacheWrite {
            path: path.to_path_buf(),
            reason: format!("creating cache directory: {e}"),
        })?;
    }

    let content = serde_json::to_string(value)?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, content).map_err(|e| SlipwayError::CacheWrite {
        path: path.to_path_buf(),
        reason: format!("writing temp file: {e}"),
    })?;

    fs::rename(&tmp, path).map_err(|e| SlipwayError::CacheWrite {
        path: path.to_path_buf(),
        reason: format!("renaming temp file: {e}"),
    })
}

/// A computed cache value waiting for its side effect to succeed.
///
/// The deployment contract is compute -> execute -> persist-on-success:
/// a `PendingCache` carries the candidate new state and is only written
/// out via [`PendingCache::commit`], which callers invoke strictly
/// after the corresponding build or module operation reported success.
/// Dropping it uncommitted discards the candidate state.
#[derive(Debug)]
pub struct PendingCache<T: Serialize> {
    path: PathBuf,
    value: T,
}

impl<T: Serialize> PendingCache<T> {
    pub fn new(path: PathBuf, value: T) -> Self {
        Self { path, value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Persist the candidate state. Call only after the operation it
    /// describes has completed successfully.
    pub fn commit(self) -> SlipwayResult<()> {
        write_cache(&self.path, &self.value)
    }
}
