// Server module.
// Offline-capable reverse proxy that dispatches every request as a fetch event.

pub mod launch;
pub mod proxy;

pub use launch::{prepare, serve};
pub use proxy::{ProxyState, router};
