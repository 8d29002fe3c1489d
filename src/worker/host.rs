// Hosting environment seam.
// The controls a worker script may invoke on the runtime that hosts it.

use std::sync::Weak;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{NetfirstError, Result};

use super::events::{ExtendFuture, WorkerId};

/// Runtime that owns worker lifecycles and the clients they control.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// One-shot request to activate `worker` as soon as it is installed.
    fn skip_waiting(&self, worker: WorkerId);

    /// Make `worker` the controller of every open client, releasing the previous one.
    async fn claim_clients(&self, worker: WorkerId) -> Result<()>;
}

/// What a running script sees of its host.
#[derive(Clone)]
pub struct WorkerScope {
    id: WorkerId,
    host: Weak<dyn WorkerHost>,
}

impl WorkerScope {
    pub fn new(id: WorkerId, host: Weak<dyn WorkerHost>) -> Self {
        Self { id, host }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Signal the host to skip the waiting phase. Does not wait.
    pub fn skip_waiting(&self) {
        if let Some(host) = self.host.upgrade() {
            host.skip_waiting(self.id);
        }
    }

    /// Future that claims all clients, suitable for `ActivateEvent::wait_until`.
    pub fn claim_clients(&self) -> ExtendFuture {
        let host = self.host.clone();
        let id = self.id;
        async move {
            let host = host.upgrade().ok_or(NetfirstError::HostGone)?;
            host.claim_clients(id).await
        }
        .boxed()
    }
}
