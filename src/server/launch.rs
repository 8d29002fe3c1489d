// Server startup.
// Installs the network-first worker when worker mode is on, then serves the proxy.

use std::sync::Arc;

use crate::config::ServeConfig;
use crate::error::Result;
use crate::http::HttpNetwork;
use crate::worker::{NetworkFirst, Registration};

use super::proxy::{ProxyState, router};

/// Build the hosting environment for `config`.
///
/// With worker mode on, a network-first worker is installed and has claimed
/// clients before this returns.
pub async fn prepare(config: &ServeConfig) -> Result<Arc<Registration>> {
    let network = Arc::new(HttpNetwork::new()?);
    let registration = Registration::new(network.clone());

    if config.worker_mode {
        let caches = Arc::new(config.cache.storage()?);
        tracing::info!(cache_dir = %caches.base().display(), "cache fallback enabled");
        let script = Arc::new(NetworkFirst::new(network, caches));
        registration.register(script).await?;
    } else {
        tracing::info!("worker mode off, forwarding without interception");
    }

    Ok(registration)
}

/// Serve until ctrl-c.
pub async fn serve(config: &ServeConfig, registration: Arc<Registration>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        origin = %config.origin,
        worker_mode = config.worker_mode,
        "listening"
    );

    let app = router(ProxyState::new(config.origin.clone(), registration));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DEFAULT_CACHE_NAME};
    use crate::worker::WorkerState;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;
    use url::Url;

    fn config(worker_mode: bool, cache_dir: &TempDir) -> ServeConfig {
        ServeConfig {
            origin: Url::parse("http://127.0.0.1:9").unwrap(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            worker_mode,
            cache: CacheConfig {
                cache_dir: Some(cache_dir.path().to_path_buf()),
                cache_name: DEFAULT_CACHE_NAME.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_prepare_with_worker_mode_claims_clients() {
        let temp_dir = TempDir::new().unwrap();
        let registration = prepare(&config(true, &temp_dir)).await.unwrap();

        let controller = registration.controller().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Active);
        assert_eq!(registration.skip_waiting_signals(), 1);
    }

    #[tokio::test]
    async fn test_prepare_without_worker_mode_has_no_controller() {
        let temp_dir = TempDir::new().unwrap();
        let registration = prepare(&config(false, &temp_dir)).await.unwrap();

        assert!(registration.controller().await.is_none());
        assert_eq!(registration.skip_waiting_signals(), 0);
    }
}
