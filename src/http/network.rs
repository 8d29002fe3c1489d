// Network seam.
// Anything that can perform a live fetch for an intercepted request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::NetworkError;

use super::types::{Request, Response};

/// A live network.
///
/// `fetch` resolves with whatever response the server sent, error statuses
/// included, and fails only when no response was received.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

#[async_trait]
impl<N: Network + ?Sized> Network for Arc<N> {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        (**self).fetch(request).await
    }
}
