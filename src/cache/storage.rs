// Cache Storage seam and the in-memory store.
// The interceptor only ever reads through `CacheStorage`; population belongs to the host.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::VARY;
use tokio::sync::RwLock;

use crate::error::{NetfirstError, Result};
use crate::http::{Request, Response};

/// Read side of Cache Storage, as seen by a fetch handler.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Find a stored response for `request`, searching caches in creation order.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>>;
}

#[async_trait]
impl<C: CacheStorage + ?Sized> CacheStorage for Arc<C> {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        (**self).match_request(request).await
    }
}

/// Reject pairs that `Cache.put` refuses to store.
pub fn check_storable(request: &Request, response: &Response) -> Result<()> {
    if !request.is_cacheable() {
        return Err(NetfirstError::Uncacheable(format!(
            "{} {} is not a GET request",
            request.method, request.url
        )));
    }
    if response.status == StatusCode::PARTIAL_CONTENT {
        return Err(NetfirstError::Uncacheable(format!(
            "partial response for {}",
            request.url
        )));
    }
    let vary_all = response
        .headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim() == "*");
    if vary_all {
        return Err(NetfirstError::Uncacheable(format!(
            "response for {} varies on *",
            request.url
        )));
    }
    Ok(())
}

/// One named cache.
type NamedCache = HashMap<String, Response>;

/// Process-local Cache Storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    /// Named caches in creation order.
    caches: RwLock<Vec<(String, NamedCache)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named cache if it does not exist yet.
    pub async fn open(&self, cache_name: &str) {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|(name, _)| name == cache_name) {
            caches.push((cache_name.to_string(), NamedCache::new()));
        }
    }

    /// Store a response, opening the cache on first use.
    pub async fn put(&self, cache_name: &str, request: &Request, response: Response) -> Result<()> {
        check_storable(request, &response)?;

        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(name, _)| name == cache_name) {
            Some(index) => index,
            None => {
                caches.push((cache_name.to_string(), NamedCache::new()));
                caches.len() - 1
            }
        };
        caches[index].1.insert(request.cache_key(), response);
        Ok(())
    }

    /// Look up a request in one named cache.
    pub async fn match_in(&self, cache_name: &str, request: &Request) -> Option<Response> {
        if !request.is_cacheable() {
            return None;
        }
        let caches = self.caches.read().await;
        caches
            .iter()
            .find(|(name, _)| name == cache_name)
            .and_then(|(_, entries)| entries.get(&request.cache_key()).cloned())
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn delete(&self, cache_name: &str, request: &Request) -> bool {
        let mut caches = self.caches.write().await;
        caches
            .iter_mut()
            .find(|(name, _)| name == cache_name)
            .is_some_and(|(_, entries)| entries.remove(&request.cache_key()).is_some())
    }

    /// URLs stored in a named cache, sorted.
    pub async fn keys(&self, cache_name: &str) -> Result<Vec<String>> {
        let caches = self.caches.read().await;
        let (_, entries) = caches
            .iter()
            .find(|(name, _)| name == cache_name)
            .ok_or_else(|| NetfirstError::CacheNotFound(cache_name.to_string()))?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Drop a whole named cache. Returns whether it existed.
    pub async fn delete_cache(&self, cache_name: &str) -> bool {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(name, _)| name != cache_name);
        caches.len() != before
    }

    pub async fn cache_names(&self) -> Vec<String> {
        let caches = self.caches.read().await;
        caches.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        let key = request.cache_key();
        let caches = self.caches.read().await;
        Ok(caches
            .iter()
            .find_map(|(_, entries)| entries.get(&key).cloned()))
    }
}
