//! Content fingerprinting for addon modules
//!
//! A module fingerprint is a SHA-256 digest over every regular file in
//! the module directory. Per-file digests are collected keyed by their
//! path relative to the module root, then the digest values are sorted
//! and concatenated before the final digest, so the result does not
//! depend on filesystem enumeration order.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Hash raw bytes using SHA-256, returning lowercase hex
fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compute the content fingerprint for one module directory.
///
/// Unreadable files are skipped with a warning rather than failing the
/// whole run. An empty or missing directory yields the digest of the
/// empty input, which callers must not confuse with "no such module" --
/// module existence is decided by the catalog listing, not here.
///
/// The concatenation is ordered by digest value, not by relative path;
/// existing cache files were produced with this ordering and stay
/// comparable.
pub fn fingerprint_module(module_dir: &Path) -> String {
    let mut file_hashes: BTreeMap<String, String> = BTreeMap::new();

    for entry in WalkDir::new(module_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(module_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();

        match fs::read(entry.path()) {
            Ok(bytes) => {
                file_hashes.insert(rel, hash_bytes(&bytes));
            }
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", entry.path().display(), e);
            }
        }
    }

    let mut digests: Vec<&String> = file_hashes.values().collect();
    digests.sort();

    let combined: String = digests.iter().map(|s| s.as_str()).collect();
    let fingerprint = hash_bytes(combined.as_bytes());

    debug!(
        "Fingerprinted {} ({} files): {}",
        module_dir.display(),
        file_hashes.len(),
        &fingerprint[..12.min(fingerprint.len())]
    );

    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn deterministic_across_runs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), b"alpha").unwrap();
        fs::write(dir.path().join("b.py"), b"beta").unwrap();

        let h1 = fingerprint_module(dir.path());
        let h2 = fingerprint_module(dir.path());
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn independent_of_creation_order() {
        let first = TempDir::new().unwrap();
        fs::write(first.path().join("a.py"), b"alpha").unwrap();
        fs::write(first.path().join("b.py"), b"beta").unwrap();

        let second = TempDir::new().unwrap();
        fs::write(second.path().join("b.py"), b"beta").unwrap();
        fs::write(second.path().join("a.py"), b"alpha").unwrap();

        assert_eq!(
            fingerprint_module(first.path()),
            fingerprint_module(second.path())
        );
    }

    #[test]
    fn one_byte_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), b"alpha").unwrap();
        let before = fingerprint_module(dir.path());

        fs::write(dir.path().join("a.py"), b"alphb").unwrap();
        let after = fingerprint_module(dir.path());

        assert_ne!(before, after);
    }

    #[test]
    fn recurses_into_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("top.py"), b"top").unwrap();
        let shallow = fingerprint_module(dir.path());

        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models").join("deep.py"), b"deep").unwrap();
        let nested = fingerprint_module(dir.path());

        assert_ne!(shallow, nested);
    }

    #[test]
    fn empty_dir_yields_empty_input_digest() {
        let dir = TempDir::new().unwrap();
        // SHA-256 of the empty string
        assert_eq!(
            fingerprint_module(dir.path()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_dir_behaves_like_empty() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("never-created");
        assert_eq!(
            fingerprint_module(&gone),
            fingerprint_module(dir.path().join("also-never-created").as_path())
        );
    }
}
