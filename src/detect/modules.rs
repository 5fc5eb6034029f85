//! Module catalog listing and change detection

use crate::cache::{fingerprint_module, ModuleCache, ModuleEntry};
use crate::error::{SlipwayError, SlipwayResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// List the module catalog: every immediate subdirectory of the addons
/// root is one installable module.
///
/// A missing or non-directory addons root is a hard failure -- no plan
/// can be produced without a catalog.
pub fn list_catalog_modules(addons_root: &Path) -> SlipwayResult<BTreeSet<String>> {
    if !addons_root.exists() {
        return Err(SlipwayError::AddonsRootMissing(addons_root.to_path_buf()));
    }
    if !addons_root.is_dir() {
        return Err(SlipwayError::AddonsRootNotDir(addons_root.to_path_buf()));
    }

    let mut modules = BTreeSet::new();
    let entries = fs::read_dir(addons_root)
        .map_err(|e| SlipwayError::io(format!("listing {}", addons_root.display()), e))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| SlipwayError::io(format!("listing {}", addons_root.display()), e))?;
        if entry.path().is_dir() {
            modules.insert(entry.file_name().to_string_lossy().to_string());
        }
    }

    info!(
        "Found {} addons in folder: {}",
        modules.len(),
        addons_root.display()
    );
    Ok(modules)
}

/// Result of a change-detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedModules {
    /// Modules that are new or whose content changed since the cache
    pub updated: BTreeSet<String>,
    /// Candidate new cache: every live module with its current
    /// fingerprint; stale entries pruned
    pub cache: ModuleCache,
}

/// Compare the current fingerprints of every catalog module against the
/// cached fingerprints.
///
/// A module absent from the cache counts as changed (never seen); a
/// cache key with no live module directory is dropped from the new
/// cache. The returned `updated` set is unordered; callers impose
/// ordering where reproducibility matters.
pub fn detect_module_changes(
    addons_root: &Path,
    cached: &ModuleCache,
) -> SlipwayResult<DetectedModules> {
    let catalog = list_catalog_modules(addons_root)?;

    let mut updated = BTreeSet::new();
    let mut cache = ModuleCache::new();

    for name in &catalog {
        let current = fingerprint_module(&addons_root.join(name));

        match cached.get(name) {
            Some(entry) if entry.content_hash == current => {
                // Unchanged, carry forward
                cache.insert(name.clone(), entry.clone());
            }
            Some(_) => {
                info!("Addon '{}' content changed, marked for update", name);
                updated.insert(name.clone());
                cache.insert(
                    name.clone(),
                    ModuleEntry {
                        content_hash: current,
                    },
                );
            }
            None => {
                info!("New addon '{}' detected, marked for update", name);
                updated.insert(name.clone());
                cache.insert(
                    name.clone(),
                    ModuleEntry {
                        content_hash: current,
                    },
                );
            }
        }
    }

    for stale in cached.keys().filter(|k| !catalog.contains(*k)) {
        debug!("Addon '{}' no longer exists, removed from cache", stale);
    }

    Ok(DetectedModules { updated, cache })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_module(root: &Path, name: &str, content: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__manifest__.py"), content).unwrap();
    }

    #[test]
    fn catalog_lists_directories_only() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "sale", "x");
        write_module(root.path(), "crm", "y");
        fs::write(root.path().join("requirements.txt"), "").unwrap();

        let catalog = list_catalog_modules(root.path()).unwrap();
        assert_eq!(
            catalog,
            BTreeSet::from(["crm".to_string(), "sale".to_string()])
        );
    }

    #[test]
    fn catalog_missing_root_is_fatal() {
        let root = TempDir::new().unwrap();
        let gone = root.path().join("absent");
        assert!(matches!(
            list_catalog_modules(&gone),
            Err(SlipwayError::AddonsRootMissing(_))
        ));
    }

    #[test]
    fn new_module_is_marked_updated() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "sale", "v1");

        let detected = detect_module_changes(root.path(), &ModuleCache::new()).unwrap();
        assert_eq!(detected.updated, BTreeSet::from(["sale".to_string()]));
        assert!(detected.cache.contains_key("sale"));
    }

    #[test]
    fn unchanged_module_is_not_updated() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "sale", "v1");

        let first = detect_module_changes(root.path(), &ModuleCache::new()).unwrap();
        let second = detect_module_changes(root.path(), &first.cache).unwrap();

        assert!(second.updated.is_empty());
        assert_eq!(second.cache, first.cache);
    }

    #[test]
    fn changed_module_is_updated_with_new_hash() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "sale", "v1");
        let first = detect_module_changes(root.path(), &ModuleCache::new()).unwrap();

        write_module(root.path(), "sale", "v2");
        let second = detect_module_changes(root.path(), &first.cache).unwrap();

        assert_eq!(second.updated, BTreeSet::from(["sale".to_string()]));
        assert_ne!(
            second.cache["sale"].content_hash,
            first.cache["sale"].content_hash
        );
    }

    #[test]
    fn mixed_known_and_new_modules() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "a", "same");
        let first = detect_module_changes(root.path(), &ModuleCache::new()).unwrap();

        write_module(root.path(), "b", "fresh");
        let second = detect_module_changes(root.path(), &first.cache).unwrap();

        assert_eq!(second.updated, BTreeSet::from(["b".to_string()]));
        assert!(second.cache.contains_key("a"));
        assert!(second.cache.contains_key("b"));
    }

    #[test]
    fn removed_module_is_pruned_from_cache() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "a", "x");

        let mut cached = ModuleCache::new();
        cached.insert(
            "a".to_string(),
            ModuleEntry {
                content_hash: fingerprint_module(&root.path().join("a")),
            },
        );
        cached.insert(
            "zombie".to_string(),
            ModuleEntry {
                content_hash: "dead".to_string(),
            },
        );

        let detected = detect_module_changes(root.path(), &cached).unwrap();
        assert!(detected.updated.is_empty());
        assert!(detected.cache.contains_key("a"));
        assert!(!detected.cache.contains_key("zombie"));
    }
}
