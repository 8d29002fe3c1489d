// Lifecycle and fetch events dispatched to a worker script.
// Extendable events collect futures the host awaits before moving on.

use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::error::{FetchError, NetfirstError, Result};
use crate::http::{Request, Response};

/// Identifies one installed worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker#{}", self.0)
    }
}

/// Future passed to `wait_until`.
pub type ExtendFuture = BoxFuture<'static, Result<()>>;

/// Future passed to `respond_with`.
pub type ResponseFuture = BoxFuture<'static, std::result::Result<Response, FetchError>>;

/// Futures an extendable event must outlive.
#[derive(Default)]
struct Extensions(Vec<ExtendFuture>);

impl Extensions {
    fn push<F>(&mut self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.0.push(future.boxed());
    }

    /// Await every extension; the first error wins.
    async fn settle(self) -> Result<()> {
        join_all(self.0).await.into_iter().collect()
    }
}

/// Dispatched once when a worker starts installing.
pub struct InstallEvent {
    pub worker_id: WorkerId,
    extensions: Extensions,
}

impl InstallEvent {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            extensions: Extensions::default(),
        }
    }

    /// Keep installation open until `future` settles.
    pub fn wait_until<F>(&mut self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.extensions.push(future);
    }

    pub(crate) async fn settle(self) -> Result<()> {
        self.extensions.settle().await
    }
}

/// Dispatched once when a worker starts activating.
pub struct ActivateEvent {
    pub worker_id: WorkerId,
    extensions: Extensions,
}

impl ActivateEvent {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            extensions: Extensions::default(),
        }
    }

    /// Keep activation open until `future` settles.
    pub fn wait_until<F>(&mut self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.extensions.push(future);
    }

    pub(crate) async fn settle(self) -> Result<()> {
        self.extensions.settle().await
    }
}

/// Dispatched for every request made by a controlled client.
pub struct FetchEvent {
    request: Request,
    response: Option<ResponseFuture>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Replace the default response. May be called at most once.
    pub fn respond_with<F>(&mut self, future: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<Response, FetchError>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(NetfirstError::AlreadyResponded);
        }
        self.response = Some(future.boxed());
        Ok(())
    }

    /// Split into the request and the handler's response, if it gave one.
    pub(crate) fn into_parts(self) -> (Request, Option<ResponseFuture>) {
        (self.request, self.response)
    }
}
