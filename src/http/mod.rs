// HTTP module.
// Request/response value types and the live network used by the fetch interceptor.

pub mod client;
pub mod network;
pub mod types;

pub use client::HttpNetwork;
pub use network::Network;
pub use types::{Request, Response};
