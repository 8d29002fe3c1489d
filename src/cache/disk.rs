// On-disk Cache Storage.
// Persists named caches under the user cache directory so fallbacks survive restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{NetfirstError, Result};
use crate::http::{Request, Response};

use super::paths;
use super::storage::{CacheStorage, check_storable};
use super::store::{self, CachedData};

/// Metadata stored next to each response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    /// Header values kept as raw bytes; they need not be UTF-8.
    headers: Vec<(String, Vec<u8>)>,
}

/// Listing row for a stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub url: String,
    pub status: u16,
    pub size: usize,
    pub cached_at: DateTime<Utc>,
}

/// Cache Storage persisted on the local filesystem.
///
/// Layout under the base directory:
/// - `caches.json`: cache names in creation order
/// - `caches/<name>/<sha256(url)>.json`: status, headers and URL
/// - `caches/<name>/<sha256(url)>.body`: raw body bytes
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    base: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Storage rooted at the platform cache directory.
    pub fn default_location() -> Result<Self> {
        paths::cache_dir()
            .map(Self::new)
            .ok_or(NetfirstError::NoCacheDir)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Cache names in creation order.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        let index = store::read_cached::<Vec<String>>(&paths::index_path(&self.base))?;
        Ok(index.map(|cached| cached.data).unwrap_or_default())
    }

    /// Create the named cache if it does not exist yet.
    pub fn open(&self, cache_name: &str) -> Result<()> {
        let mut names = self.cache_names()?;
        if names.iter().any(|name| name == cache_name) {
            return Ok(());
        }
        std::fs::create_dir_all(paths::named_cache_dir(&self.base, cache_name))?;
        names.push(cache_name.to_string());
        store::write_cached(&paths::index_path(&self.base), &names)
    }

    /// Store a response, opening the cache on first use.
    pub fn put(&self, cache_name: &str, request: &Request, response: &Response) -> Result<()> {
        check_storable(request, response)?;
        self.open(cache_name)?;

        let key = request.cache_key();
        let meta = EntryMeta {
            url: key.clone(),
            status: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| {
                    (name.as_str().to_string(), value.as_bytes().to_vec())
                })
                .collect(),
        };

        // Body first, so a visible metadata file always has its body.
        store::write_bytes(
            &paths::entry_body_path(&self.base, cache_name, &key),
            &response.body,
        )?;
        store::write_cached(&paths::entry_meta_path(&self.base, cache_name, &key), &meta)?;

        tracing::debug!(cache = cache_name, url = %key, "stored response");
        Ok(())
    }

    /// Look up a request in one named cache.
    pub fn match_in(&self, cache_name: &str, request: &Request) -> Result<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        let key = request.cache_key();

        let Some(meta) =
            store::read_cached::<EntryMeta>(&paths::entry_meta_path(&self.base, cache_name, &key))?
        else {
            return Ok(None);
        };
        let Some(body) =
            store::read_bytes(&paths::entry_body_path(&self.base, cache_name, &key))?
        else {
            return Ok(None);
        };

        Ok(Some(into_response(meta.data, body)?))
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, cache_name: &str, request: &Request) -> Result<bool> {
        let key = request.cache_key();
        let existed = store::delete(&paths::entry_meta_path(&self.base, cache_name, &key))?;
        store::delete(&paths::entry_body_path(&self.base, cache_name, &key))?;
        Ok(existed)
    }

    /// Entries stored in a named cache, sorted by URL.
    pub fn keys(&self, cache_name: &str) -> Result<Vec<EntryInfo>> {
        if !self.cache_names()?.iter().any(|name| name == cache_name) {
            return Err(NetfirstError::CacheNotFound(cache_name.to_string()));
        }

        let dir = paths::named_cache_dir(&self.base, cache_name);
        let mut entries = Vec::new();
        if !dir.exists() {
            return Ok(entries);
        }

        for dir_entry in std::fs::read_dir(&dir)? {
            let path = dir_entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(meta) = store::read_cached::<EntryMeta>(&path)? else {
                continue;
            };
            let size = std::fs::metadata(path.with_extension("body"))
                .map(|m| m.len() as usize)
                .unwrap_or(0);
            entries.push(EntryInfo {
                url: meta.data.url,
                status: meta.data.status,
                size,
                cached_at: meta.cached_at,
            });
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }

    /// Drop a whole named cache. Returns whether it existed.
    pub fn delete_cache(&self, cache_name: &str) -> Result<bool> {
        let mut names = self.cache_names()?;
        let before = names.len();
        names.retain(|name| name != cache_name);
        if names.len() == before {
            return Ok(false);
        }

        store::delete_dir(&paths::named_cache_dir(&self.base, cache_name))?;
        store::write_cached(&paths::index_path(&self.base), &names)?;
        Ok(true)
    }

    /// Search every cache in creation order.
    fn match_any(&self, request: &Request) -> Result<Option<Response>> {
        for name in self.cache_names()? {
            if let Some(response) = self.match_in(&name, request)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

fn into_response(meta: EntryMeta, body: Vec<u8>) -> Result<Response> {
    let status = StatusCode::from_u16(meta.status)
        .map_err(|e| NetfirstError::Other(format!("stored status {}: {}", meta.status, e)))?;

    let mut headers = HeaderMap::new();
    for (name, value) in meta.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NetfirstError::Header(e.to_string()))?;
        let value =
            HeaderValue::from_bytes(&value).map_err(|e| NetfirstError::Header(e.to_string()))?;
        headers.append(name, value);
    }

    Ok(Response {
        status,
        headers,
        body: Bytes::from(body),
    })
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        let storage = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || storage.match_any(&request))
            .await
            .map_err(|e| NetfirstError::Other(format!("cache lookup task failed: {}", e)))?
    }
}
