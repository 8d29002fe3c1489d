// Worker lifecycle.
// Drives one script instance from installation to active and dispatches its events.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{FetchError, NetfirstError, Result};
use crate::http::{Network, Request, Response};

use super::events::{ActivateEvent, FetchEvent, InstallEvent, WorkerId};
use super::host::{WorkerHost, WorkerScope};

/// Event handlers of a worker script. Unhandled events keep the default behaviour.
pub trait WorkerScript: Send + Sync {
    fn install(&self, _scope: &WorkerScope, _event: &mut InstallEvent) {}

    fn activate(&self, _scope: &WorkerScope, _event: &mut ActivateEvent) {}

    fn fetch(&self, _scope: &WorkerScope, _event: &mut FetchEvent) {}
}

/// Lifecycle position of a worker. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Parsed = 0,
    Installing = 1,
    /// Installed and waiting for the current controller to step aside.
    Installed = 2,
    Activating = 3,
    Active = 4,
    /// Failed or replaced; never receives events again.
    Redundant = 5,
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Parsed,
            1 => WorkerState::Installing,
            2 => WorkerState::Installed,
            3 => WorkerState::Activating,
            4 => WorkerState::Active,
            _ => WorkerState::Redundant,
        }
    }
}

/// One running instance of a worker script.
pub struct ServiceWorker {
    scope: WorkerScope,
    script: Arc<dyn WorkerScript>,
    network: Arc<dyn Network>,
    state: AtomicU8,
}

impl ServiceWorker {
    pub fn new(
        id: WorkerId,
        script: Arc<dyn WorkerScript>,
        host: Weak<dyn WorkerHost>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            scope: WorkerScope::new(id, host),
            script,
            network,
            state: AtomicU8::new(WorkerState::Parsed as u8),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.scope.id()
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Dispatch `install` and wait for its extensions.
    pub async fn install(&self) -> Result<()> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        tracing::debug!(worker = %self.id(), "installing");

        let mut event = InstallEvent::new(self.id());
        self.script.install(&self.scope, &mut event);

        if let Err(e) = event.settle().await {
            self.make_redundant();
            return Err(NetfirstError::Lifecycle("install", e.to_string()));
        }

        self.transition(WorkerState::Installing, WorkerState::Installed)?;
        tracing::debug!(worker = %self.id(), "installed");
        Ok(())
    }

    /// Dispatch `activate`; the worker becomes active only once every extension settled.
    pub async fn activate(&self) -> Result<()> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        tracing::debug!(worker = %self.id(), "activating");

        let mut event = ActivateEvent::new(self.id());
        self.script.activate(&self.scope, &mut event);

        if let Err(e) = event.settle().await {
            self.make_redundant();
            return Err(NetfirstError::Lifecycle("activate", e.to_string()));
        }

        self.transition(WorkerState::Activating, WorkerState::Active)?;
        tracing::debug!(worker = %self.id(), "active");
        Ok(())
    }

    /// Dispatch `fetch` and resolve to the handler's response.
    ///
    /// Falls back to a plain network fetch when the worker is not active or the
    /// handler did not call `respond_with`.
    pub async fn handle_fetch(
        &self,
        request: Request,
    ) -> std::result::Result<Response, FetchError> {
        if self.state() != WorkerState::Active {
            tracing::debug!(
                worker = %self.id(),
                state = self.state().name(),
                "not active, passing through"
            );
            return Ok(self.network.fetch(&request).await?);
        }

        let mut event = FetchEvent::new(request);
        self.script.fetch(&self.scope, &mut event);

        match event.into_parts() {
            (_, Some(response)) => response.await,
            (request, None) => Ok(self.network.fetch(&request).await?),
        }
    }

    /// Retire this worker; it stops handling events.
    pub fn make_redundant(&self) {
        self.state.store(WorkerState::Redundant as u8, Ordering::Release);
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|current| {
                NetfirstError::InvalidState(WorkerState::from_u8(current).name(), from.name())
            })
    }
}
