// Live network client.
// Performs fetches over reqwest and hands back every response the server sends.

use async_trait::async_trait;
use reqwest::{Client, redirect};

use crate::error::{NetfirstError, NetworkError, Result};

use super::network::Network;
use super::types::{Request, Response};

const USER_AGENT: &str = concat!("netfirst/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed network.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a client that passes redirects through to the caller.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(NetfirstError::Http)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::BodyInterrupted(e.to_string()))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
