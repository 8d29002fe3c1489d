// Error types for netfirst.
// Handles network, routing, cache, lifecycle, and general application errors.

use thiserror::Error;

/// Transport-level failure of a live fetch.
///
/// An HTTP response with any status is never a `NetworkError`.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request aborted before a response arrived")]
    Aborted,

    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// The status line arrived but the body was cut off.
    #[error("response body interrupted: {0}")]
    BodyInterrupted(String),
}

impl NetworkError {
    /// Whether the server had already started answering.
    pub fn after_response(&self) -> bool {
        matches!(self, NetworkError::BodyInterrupted(_))
    }
}

/// Terminal outcome of routing a fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network failed and no cached response for {url}")]
    NoMatch {
        url: String,
        #[source]
        network: NetworkError,
    },

    #[error("network failed and cache lookup for {url} errored: {cache}")]
    CacheLookup {
        url: String,
        network: NetworkError,
        #[source]
        cache: Box<NetfirstError>,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Error, Debug)]
pub enum NetfirstError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header: {0}")]
    Header(String),

    #[error("Worker is {0}, expected {1}")]
    InvalidState(&'static str, &'static str),

    #[error("{0} failed: {1}")]
    Lifecycle(&'static str, String),

    #[error("respond_with was already called for this fetch")]
    AlreadyResponded,

    #[error("Host environment is gone")]
    HostGone,

    #[error("Cannot store in cache: {0}")]
    Uncacheable(String),

    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("No cache directory available on this platform")]
    NoCacheDir,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, NetfirstError>;
