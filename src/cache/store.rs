// Cache store for reading and writing cached files.
// Handles JSON serialization, raw bodies, and atomic filesystem writes.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Wrapper for cached data with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was cached.
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// Read cached JSON data from a file.
pub fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let cached: CachedData<T> = serde_json::from_str(&contents)?;
    Ok(Some(cached))
}

/// Write data to cache as JSON.
pub fn write_cached<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let cached = CachedData::new(data);
    let json = serde_json::to_string_pretty(&cached)?;
    write_atomic(path, json.as_bytes())
}

/// Write raw bytes to cache (response bodies).
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, bytes)
}

/// Read raw bytes from cache.
pub fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    if !path.exists() {
        return Ok(None);
    }

    Ok(Some(fs::read(path)?))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write atomically via temp file
    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Sibling temp file for `path`, keeping its full name so `x.json` and `x.body` differ.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Delete a cached file. Returns whether it existed.
pub fn delete(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_file(path)?;
        return Ok(true);
    }
    Ok(false)
}

/// Delete a cached directory and all contents.
pub fn delete_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_write_and_read_cached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/test.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_cached(&path, &data).unwrap();

        let cached: Option<CachedData<TestData>> = read_cached(&path).unwrap();
        let cached = cached.unwrap();
        assert_eq!(cached.data, data);
        assert!(cached.cached_at <= Utc::now());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_and_read_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entry.body");

        let bytes = [0u8, 159, 146, 150, b'\n'];
        write_bytes(&path, &bytes).unwrap();

        assert_eq!(read_bytes(&path).unwrap(), Some(bytes.to_vec()));
    }

    #[test]
    fn test_temp_paths_differ_per_file() {
        let dir = Path::new("/tmp/netfirst/caches/v1");
        let meta = temp_path(&dir.join("abc.json"));
        let body = temp_path(&dir.join("abc.body"));

        assert_ne!(meta, body);
        assert_eq!(meta, dir.join("abc.json.tmp"));
        assert_eq!(body, dir.join("abc.body.tmp"));
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let cached: Option<CachedData<TestData>> = read_cached(&path).unwrap();
        assert!(cached.is_none());
        assert!(read_bytes(&path).unwrap().is_none());
    }

    #[test]
    fn test_delete_reports_existence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.body");

        write_bytes(&path, b"x").unwrap();
        assert!(delete(&path).unwrap());
        assert!(!delete(&path).unwrap());
    }
}
