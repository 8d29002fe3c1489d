// Cache Storage module.
// Request/response stores the fetch interceptor falls back to when the network fails.

pub mod disk;
pub mod paths;
pub mod storage;
pub mod store;

pub use disk::{DiskCacheStorage, EntryInfo};
pub use storage::{CacheStorage, MemoryCacheStorage};
