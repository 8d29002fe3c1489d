// Worker registration.
// Host-side record of installed workers and the one controlling clients.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{FetchError, NetfirstError, Result};
use crate::http::{Network, Request, Response};

use super::events::WorkerId;
use super::host::WorkerHost;
use super::lifecycle::{ServiceWorker, WorkerScript, WorkerState};

/// Hosting environment for a single scope.
///
/// Requests are dispatched to the controller when there is one and go straight
/// to the network otherwise.
pub struct Registration {
    network: Arc<dyn Network>,
    next_id: AtomicU64,
    /// Workers that asked to skip waiting.
    skip_waiting: Mutex<HashSet<WorkerId>>,
    skip_waiting_signals: AtomicUsize,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    controller: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new(network: Arc<dyn Network>) -> Arc<Self> {
        Arc::new(Self {
            network,
            next_id: AtomicU64::new(1),
            skip_waiting: Mutex::new(HashSet::new()),
            skip_waiting_signals: AtomicUsize::new(0),
            waiting: RwLock::new(None),
            active: RwLock::new(None),
            controller: RwLock::new(None),
        })
    }

    /// Install a new worker for this scope.
    ///
    /// The worker activates right away when it signaled skip waiting or when
    /// nothing is active yet; otherwise it waits for `activate_waiting`.
    pub async fn register(
        self: &Arc<Self>,
        script: Arc<dyn WorkerScript>,
    ) -> Result<Arc<ServiceWorker>> {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let host: Arc<dyn WorkerHost> = self.clone();
        let worker = Arc::new(ServiceWorker::new(
            id,
            script,
            Arc::downgrade(&host),
            self.network.clone(),
        ));

        worker.install().await?;

        let skip = self.take_skip_waiting(id);
        let nothing_active = self.active.read().await.is_none();
        if skip || nothing_active {
            self.promote(worker.clone()).await?;
        } else {
            tracing::debug!(worker = %id, "waiting for current worker to release");
            let replaced = self.waiting.write().await.replace(worker.clone());
            if let Some(replaced) = replaced {
                replaced.make_redundant();
            }
        }

        Ok(worker)
    }

    /// Promote the waiting worker, if any. Returns whether one was activated.
    pub async fn activate_waiting(&self) -> Result<bool> {
        let waiting = self.waiting.write().await.take();
        match waiting {
            Some(worker) => {
                self.promote(worker).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Route a request through the controller, or straight to the network.
    pub async fn fetch(&self, request: Request) -> std::result::Result<Response, FetchError> {
        let controller = self.controller.read().await.clone();
        match controller {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(self.network.fetch(&request).await?),
        }
    }

    pub async fn controller(&self) -> Option<Arc<ServiceWorker>> {
        self.controller.read().await.clone()
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Total skip-waiting signals received.
    pub fn skip_waiting_signals(&self) -> usize {
        self.skip_waiting_signals.load(Ordering::Relaxed)
    }

    fn take_skip_waiting(&self, id: WorkerId) -> bool {
        self.skip_waiting
            .lock()
            .map(|mut pending| pending.remove(&id))
            .unwrap_or(false)
    }

    /// Make `worker` the active worker and run its activation.
    ///
    /// The previous worker keeps serving its clients until the new one claims
    /// them or finishes activating.
    async fn promote(&self, worker: Arc<ServiceWorker>) -> Result<()> {
        {
            let mut waiting = self.waiting.write().await;
            if waiting.as_ref().is_some_and(|w| w.id() == worker.id()) {
                *waiting = None;
            }
        }

        let previous = self.active.write().await.replace(worker.clone());

        if let Err(e) = worker.activate().await {
            let previous = previous.filter(|p| p.state() == WorkerState::Active);
            {
                let mut active = self.active.write().await;
                if active.as_ref().is_some_and(|w| w.id() == worker.id()) {
                    *active = previous.clone();
                }
            }
            let mut controller = self.controller.write().await;
            if controller.as_ref().is_some_and(|c| c.id() == worker.id()) {
                *controller = previous;
            }
            return Err(e);
        }

        if let Some(previous) = previous {
            let mut controller = self.controller.write().await;
            if controller.as_ref().is_some_and(|c| c.id() == previous.id()) {
                *controller = Some(worker.clone());
            }
            drop(controller);
            tracing::debug!(worker = %previous.id(), "replaced by {}", worker.id());
            previous.make_redundant();
        }

        tracing::info!(worker = %worker.id(), "worker activated");
        Ok(())
    }
}

#[async_trait]
impl WorkerHost for Registration {
    fn skip_waiting(&self, worker: WorkerId) {
        self.skip_waiting_signals.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut pending) = self.skip_waiting.lock() {
            pending.insert(worker);
        }
        tracing::debug!(worker = %worker, "skip waiting");
    }

    async fn claim_clients(&self, worker: WorkerId) -> Result<()> {
        let active = self.active.read().await.clone();
        let Some(active) = active.filter(|w| w.id() == worker) else {
            return Err(NetfirstError::InvalidState("not the active worker", "active"));
        };
        if !matches!(active.state(), WorkerState::Activating | WorkerState::Active) {
            return Err(NetfirstError::InvalidState(active.state().name(), "activating"));
        }

        let previous = self.controller.write().await.replace(active);
        match previous {
            Some(previous) if previous.id() != worker => {
                tracing::debug!(worker = %worker, released = %previous.id(), "claimed clients");
                previous.make_redundant();
            }
            _ => tracing::debug!(worker = %worker, "claimed clients"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::error::NetworkError;
    use crate::worker::NetworkFirst;
    use crate::worker::events::{ActivateEvent, FetchEvent, InstallEvent};
    use crate::worker::host::WorkerScope;
    use tokio::sync::oneshot;
    use url::Url;

    struct OfflineNetwork;

    #[async_trait]
    impl Network for OfflineNetwork {
        async fn fetch(&self, _request: &Request) -> std::result::Result<Response, NetworkError> {
            Err(NetworkError::Unreachable("offline".into()))
        }
    }

    /// Answers every fetch with its own label.
    struct Labelled {
        label: &'static str,
        skip_waiting: bool,
    }

    impl WorkerScript for Labelled {
        fn install(&self, scope: &WorkerScope, _event: &mut InstallEvent) {
            if self.skip_waiting {
                scope.skip_waiting();
            }
        }

        fn activate(&self, scope: &WorkerScope, event: &mut ActivateEvent) {
            event.wait_until(scope.claim_clients());
        }

        fn fetch(&self, _scope: &WorkerScope, event: &mut FetchEvent) {
            let label = self.label;
            let _ = event.respond_with(async move { Ok(Response::ok(label)) });
        }
    }

    /// Skips waiting but claims only once the test opens the gate.
    struct GatedClaim {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl WorkerScript for GatedClaim {
        fn install(&self, scope: &WorkerScope, _event: &mut InstallEvent) {
            scope.skip_waiting();
        }

        fn activate(&self, scope: &WorkerScope, event: &mut ActivateEvent) {
            let gate = self.gate.lock().unwrap().take();
            let claim = scope.claim_clients();
            event.wait_until(async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                claim.await
            });
        }

        fn fetch(&self, _scope: &WorkerScope, event: &mut FetchEvent) {
            let _ = event.respond_with(async { Ok(Response::ok("v2")) });
        }
    }

    /// Skips waiting and never claims.
    struct Unclaimed;

    impl WorkerScript for Unclaimed {
        fn install(&self, scope: &WorkerScope, _event: &mut InstallEvent) {
            scope.skip_waiting();
        }

        fn fetch(&self, _scope: &WorkerScope, event: &mut FetchEvent) {
            let _ = event.respond_with(async { Ok(Response::ok("unclaimed")) });
        }
    }

    fn script(label: &'static str, skip_waiting: bool) -> Arc<dyn WorkerScript> {
        Arc::new(Labelled {
            label,
            skip_waiting,
        })
    }

    fn request() -> Request {
        Request::get(Url::parse("https://example.com/index.html").unwrap())
    }

    #[tokio::test]
    async fn test_no_controller_goes_to_network() {
        let registration = Registration::new(Arc::new(OfflineNetwork));

        let result = registration.fetch(request()).await;

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert!(registration.controller().await.is_none());
    }

    #[tokio::test]
    async fn test_first_worker_claims_clients() {
        let registration = Registration::new(Arc::new(OfflineNetwork));

        let worker = registration.register(script("v1", false)).await.unwrap();

        assert_eq!(worker.state(), WorkerState::Active);
        assert_eq!(registration.controller().await.unwrap().id(), worker.id());
        let response = registration.fetch(request()).await.unwrap();
        assert_eq!(response.text(), "v1");
    }

    #[tokio::test]
    async fn test_skip_waiting_replaces_controller() {
        let registration = Registration::new(Arc::new(OfflineNetwork));
        let first = registration.register(script("v1", true)).await.unwrap();
        let second = registration.register(script("v2", true)).await.unwrap();

        assert_eq!(registration.skip_waiting_signals(), 2);
        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(second.state(), WorkerState::Active);
        assert_eq!(registration.controller().await.unwrap().id(), second.id());

        let response = registration.fetch(request()).await.unwrap();
        assert_eq!(response.text(), "v2");
    }

    #[tokio::test]
    async fn test_without_skip_waiting_new_worker_waits() {
        let registration = Registration::new(Arc::new(OfflineNetwork));
        registration.register(script("v1", false)).await.unwrap();
        let second = registration.register(script("v2", false)).await.unwrap();

        assert_eq!(second.state(), WorkerState::Installed);
        assert_eq!(registration.waiting().await.unwrap().id(), second.id());
        assert_eq!(registration.fetch(request()).await.unwrap().text(), "v1");

        assert!(registration.activate_waiting().await.unwrap());
        assert!(!registration.activate_waiting().await.unwrap());
        assert_eq!(second.state(), WorkerState::Active);
        assert_eq!(registration.fetch(request()).await.unwrap().text(), "v2");
    }

    #[tokio::test]
    async fn test_previous_controller_serves_until_claim() {
        let network: Arc<dyn Network> = Arc::new(OfflineNetwork);
        let registration = Registration::new(network.clone());
        let cache = Arc::new(MemoryCacheStorage::new());
        cache
            .put("v1", &request(), Response::ok("stored"))
            .await
            .unwrap();
        let first = registration
            .register(Arc::new(NetworkFirst::new(network, cache)))
            .await
            .unwrap();

        let (release, gate) = oneshot::channel();
        let updating = {
            let registration = registration.clone();
            tokio::spawn(async move {
                let script = GatedClaim {
                    gate: Mutex::new(Some(gate)),
                };
                registration.register(Arc::new(script)).await
            })
        };

        // Let the update run up to the pending claim.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let pending = registration.active().await.unwrap();
        assert_ne!(pending.id(), first.id());
        assert_eq!(pending.state(), WorkerState::Activating);
        assert_eq!(first.state(), WorkerState::Active);
        assert_eq!(registration.controller().await.unwrap().id(), first.id());
        assert_eq!(registration.fetch(request()).await.unwrap().text(), "stored");

        release.send(()).unwrap();
        let second = updating.await.unwrap().unwrap();

        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(registration.controller().await.unwrap().id(), second.id());
        assert_eq!(registration.fetch(request()).await.unwrap().text(), "v2");
    }

    #[tokio::test]
    async fn test_activation_without_claim_takes_over_clients() {
        let registration = Registration::new(Arc::new(OfflineNetwork));
        let first = registration.register(script("v1", true)).await.unwrap();

        let second = registration.register(Arc::new(Unclaimed)).await.unwrap();

        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(second.state(), WorkerState::Active);
        assert_eq!(registration.controller().await.unwrap().id(), second.id());
        assert_eq!(registration.fetch(request()).await.unwrap().text(), "unclaimed");
    }
}
