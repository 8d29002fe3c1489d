// netfirst: network-first fetch interception with an offline cache fallback.
// The library holds the worker contract; the binary wraps it in a proxy server.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod worker;

pub use error::{FetchError, NetfirstError, NetworkError, Result};
