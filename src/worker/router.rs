// Network-first fetch routing.
// Serves the live response when the network answers and the cached one only when it cannot.

use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::error::FetchError;
use crate::http::{Network, Request, Response};

use super::events::{ActivateEvent, FetchEvent, InstallEvent};
use super::host::WorkerScope;
use super::lifecycle::WorkerScript;

/// Worker script implementing the network-first, cache-fallback policy.
///
/// Installs eagerly, claims clients on activation, and never writes to the cache.
#[derive(Clone)]
pub struct NetworkFirst {
    network: Arc<dyn Network>,
    caches: Arc<dyn CacheStorage>,
}

impl NetworkFirst {
    pub fn new(network: Arc<dyn Network>, caches: Arc<dyn CacheStorage>) -> Self {
        Self { network, caches }
    }

    /// Route one request.
    ///
    /// Any response the network produces wins, error statuses included. The
    /// cache is consulted only when the fetch failed before a response arrived.
    pub async fn route(&self, request: &Request) -> Result<Response, FetchError> {
        let network = match self.network.fetch(request).await {
            Ok(response) => {
                tracing::debug!(url = %request.url, status = %response.status, "network");
                return Ok(response);
            }
            Err(e) if e.after_response() => {
                tracing::debug!(url = %request.url, error = %e, "response interrupted");
                return Err(FetchError::Network(e));
            }
            Err(e) => e,
        };

        tracing::debug!(url = %request.url, error = %network, "network failed, trying cache");
        match self.caches.match_request(request).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url, "cache");
                Ok(response)
            }
            Ok(None) => Err(FetchError::NoMatch {
                url: request.url.to_string(),
                network,
            }),
            Err(cache) => Err(FetchError::CacheLookup {
                url: request.url.to_string(),
                network,
                cache: Box::new(cache),
            }),
        }
    }
}

impl WorkerScript for NetworkFirst {
    fn install(&self, scope: &WorkerScope, _event: &mut InstallEvent) {
        scope.skip_waiting();
    }

    fn activate(&self, scope: &WorkerScope, event: &mut ActivateEvent) {
        event.wait_until(scope.claim_clients());
    }

    fn fetch(&self, _scope: &WorkerScope, event: &mut FetchEvent) {
        let router = self.clone();
        let request = event.request().clone();
        if let Err(e) = event.respond_with(async move { router.route(&request).await }) {
            tracing::warn!(error = %e, "fetch already answered");
        }
    }
}
