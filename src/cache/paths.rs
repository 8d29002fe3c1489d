// Cache path utilities.
// Constructs filesystem paths for named caches and their entries.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

/// Get the base cache directory (~/.cache/netfirst on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "netfirst").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to the index recording cache names in creation order.
pub fn index_path(base: &Path) -> PathBuf {
    base.join("caches.json")
}

/// Path to a named cache's directory.
/// Cache names are arbitrary strings, so the directory is named by their digest.
pub fn named_cache_dir(base: &Path, cache_name: &str) -> PathBuf {
    base.join("caches").join(digest(cache_name))
}

/// Path to an entry's metadata file.
pub fn entry_meta_path(base: &Path, cache_name: &str, cache_key: &str) -> PathBuf {
    named_cache_dir(base, cache_name).join(format!("{}.json", entry_id(cache_key)))
}

/// Path to an entry's raw body file.
pub fn entry_body_path(base: &Path, cache_name: &str, cache_key: &str) -> PathBuf {
    named_cache_dir(base, cache_name).join(format!("{}.body", entry_id(cache_key)))
}

/// Stable file stem for a cache key.
/// URLs are too long and too varied to use as file names directly.
pub fn entry_id(cache_key: &str) -> String {
    digest(cache_key)
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
