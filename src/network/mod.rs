//! Network Module
//!
//! Bounded-concurrency request queue and the caching fetcher built on it.

mod fetcher;
mod queue;
mod transport;

pub use fetcher::{
    CacheStrategy, FetchDefaults, FetchOptions, SmartFetcher, PERSISTENT_KEY_PREFIX,
};
pub use queue::{RequestQueue, DEFAULT_MAX_CONCURRENT};
pub use transport::{FetchRequest, FetchResponse, HttpTransport, Transport};
