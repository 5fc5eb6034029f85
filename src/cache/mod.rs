//! Content fingerprinting and persisted change caches
//!
//! Deployments avoid redundant work by comparing the current state of
//! build inputs and addon modules against the state recorded after the
//! last successful run.

pub mod fingerprint;
pub mod store;

pub use fingerprint::fingerprint_module;
pub use store::{load_cache, write_cache, BuildInputCache, ModuleCache, ModuleEntry, PendingCache};
