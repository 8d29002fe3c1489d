// Proxy request handling.
// Translates inbound HTTP requests into fetch events against the origin and back.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as AxumResponse};
use url::Url;

use crate::error::{NetfirstError, Result};
use crate::http::{Request, Response};
use crate::worker::Registration;

/// Shared state of the proxy.
#[derive(Clone)]
pub struct ProxyState {
    origin: Url,
    registration: Arc<Registration>,
}

impl ProxyState {
    pub fn new(origin: Url, registration: Arc<Registration>) -> Self {
        Self {
            origin,
            registration,
        }
    }

    /// Build the origin request for an inbound one.
    ///
    /// Only the path and query come from the inbound URI; scheme, host and
    /// port always stay those of the origin.
    fn origin_request(
        &self,
        method: Method,
        uri: &Uri,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> Result<Request> {
        if self.origin.cannot_be_a_base() {
            return Err(NetfirstError::Other(format!(
                "origin {} cannot carry a path",
                self.origin
            )));
        }
        let mut url = self.origin.clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        url.set_fragment(None);

        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        Ok(Request {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Router that proxies every path.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(proxy).with_state(state)
}

async fn proxy(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AxumResponse {
    let request = match state.origin_request(method, &uri, headers, body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(%uri, error = %e, "bad request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let url = request.url.clone();
    match state.registration.fetch(request).await {
        Ok(response) => into_axum(response),
        Err(e) => {
            // A failed fetch has no response; the proxy reports it as a bad gateway.
            tracing::warn!(%url, error = %e, "fetch failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

fn into_axum(response: Response) -> AxumResponse {
    let Response {
        status,
        mut headers,
        body,
    } = response;
    strip_hop_by_hop(&mut headers);

    let mut out = AxumResponse::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Drop connection-scoped headers that must not be forwarded.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: [HeaderName; 8] = [
        header::CONNECTION,
        HeaderName::from_static("keep-alive"),
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
}
