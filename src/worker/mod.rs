// Worker module.
// Fetch interceptor lifecycle, its host, and the network-first routing script.

pub mod events;
pub mod host;
pub mod lifecycle;
pub mod registration;
pub mod router;

pub use events::{ActivateEvent, FetchEvent, InstallEvent, WorkerId};
pub use host::{WorkerHost, WorkerScope};
pub use lifecycle::{ServiceWorker, WorkerScript, WorkerState};
pub use registration::Registration;
pub use router::NetworkFirst;
