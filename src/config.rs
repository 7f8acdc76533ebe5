//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{
    CacheConfig, EvictionPolicy, DEFAULT_MAX_SIZE, DEFAULT_STORAGE_KEY, DEFAULT_TTL_MS,
};
use crate::network::{FetchDefaults, DEFAULT_MAX_CONCURRENT};

/// Process configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Which entries leave first when the cache is full
    pub eviction_policy: EvictionPolicy,
    /// Persist a snapshot after every mutation
    pub enable_persistence: bool,
    /// Storage slot name for the snapshot
    pub storage_key: String,
    /// Directory holding storage slots
    pub storage_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Concurrency ceiling of the request queue
    pub max_concurrent: usize,
    /// Per-attempt fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Lifetime of cached fetch responses in milliseconds
    pub fetch_cache_ttl_ms: u64,
    /// Extra attempts for retryable fetch failures
    pub fetch_retries: u32,
    /// Pause between fetch attempts in milliseconds
    pub fetch_retry_delay_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 100)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu` or `ttl` (default: lru)
    /// - `CACHE_ENABLE_PERSISTENCE` - Persist snapshots (default: false)
    /// - `CACHE_STORAGE_KEY` - Snapshot slot name (default: app-cache)
    /// - `CACHE_STORAGE_DIR` - Snapshot directory (default: .cache)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `MAX_CONCURRENT` - Concurrent outbound requests (default: 6)
    /// - `FETCH_TIMEOUT_MS` - Fetch timeout (default: 10000)
    /// - `FETCH_CACHE_TTL_MS` - Fetch response cache TTL (default: 300000)
    /// - `FETCH_RETRIES` - Fetch retries (default: 0)
    /// - `FETCH_RETRY_DELAY_MS` - Delay between retries (default: 1000)
    ///
    /// Values that fail to parse fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: parse_var("CACHE_MAX_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_size),
            default_ttl_ms: parse_var("CACHE_DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            eviction_policy: parse_var("CACHE_EVICTION_POLICY")
                .unwrap_or(defaults.eviction_policy),
            enable_persistence: parse_var("CACHE_ENABLE_PERSISTENCE")
                .unwrap_or(defaults.enable_persistence),
            storage_key: env::var("CACHE_STORAGE_KEY")
                .ok()
                .filter(|key| !key.is_empty())
                .unwrap_or(defaults.storage_key),
            storage_dir: env::var("CACHE_STORAGE_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval),
            max_concurrent: parse_var("MAX_CONCURRENT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent),
            fetch_timeout_ms: parse_var("FETCH_TIMEOUT_MS").unwrap_or(defaults.fetch_timeout_ms),
            fetch_cache_ttl_ms: parse_var("FETCH_CACHE_TTL_MS")
                .unwrap_or(defaults.fetch_cache_ttl_ms),
            fetch_retries: parse_var("FETCH_RETRIES").unwrap_or(defaults.fetch_retries),
            fetch_retry_delay_ms: parse_var("FETCH_RETRY_DELAY_MS")
                .unwrap_or(defaults.fetch_retry_delay_ms),
        }
    }

    /// Settings for the served cache instance.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.max_size,
            default_ttl: self.default_ttl_ms,
            enable_persistence: self.enable_persistence,
            storage_key: self.storage_key.clone(),
            eviction_policy: self.eviction_policy,
        }
    }

    /// Fallbacks for the smart fetcher.
    pub fn fetch_defaults(&self) -> FetchDefaults {
        FetchDefaults {
            timeout: Duration::from_millis(self.fetch_timeout_ms),
            retries: self.fetch_retries,
            retry_delay: Duration::from_millis(self.fetch_retry_delay_ms),
            cache_ttl: Duration::from_millis(self.fetch_cache_ttl_ms),
            ..FetchDefaults::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl_ms: DEFAULT_TTL_MS,
            eviction_policy: EvictionPolicy::Lru,
            enable_persistence: false,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: PathBuf::from(".cache"),
            server_port: 3000,
            sweep_interval: 60,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            fetch_timeout_ms: 10_000,
            fetch_cache_ttl_ms: 300_000,
            fetch_retries: 0,
            fetch_retry_delay_ms: 1_000,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
