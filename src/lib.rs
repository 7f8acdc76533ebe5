//! Smart Cache - keyed TTL cache and bounded-concurrency smart fetching
//!
//! Provides an in-process cache with LRU/LFU/TTL eviction and optional
//! persistence, plus a FIFO request queue and a caching HTTP fetcher.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheConfig, EvictionPolicy, KeyPattern, TtlCache};
pub use config::Config;
pub use error::{CacheError, FetchError, QueueError};
pub use network::{RequestQueue, SmartFetcher};
pub use tasks::spawn_sweep_task;
