//! Smart Fetcher Module
//!
//! Wraps outbound requests with a per-attempt timeout, optional retries,
//! bounded concurrency through a [`RequestQueue`] and a URL-keyed
//! read-through cache.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{
    current_timestamp_ms, CacheConfig, CacheEntry, CacheStats, KeyPattern, Storage, TtlCache,
};
use crate::error::FetchError;
use crate::network::{FetchRequest, FetchResponse, RequestQueue, Transport};

/// Prefix for storage slots holding persisted responses
pub const PERSISTENT_KEY_PREFIX: &str = "smart-fetch:";

// == Cache Strategy ==
/// Where successful GET responses are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Never cache
    None,
    /// In-process response cache
    #[default]
    Memory,
    /// Storage slot per URL, survives restarts when storage does
    Persistent,
}

// == Fetch Defaults ==
/// Fetcher-wide fallbacks for options a request leaves unset.
#[derive(Debug, Clone)]
pub struct FetchDefaults {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Extra attempts for retryable failures
    pub retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Lifetime of cached responses
    pub cache_ttl: Duration,
    /// Capacity of the in-process response cache
    pub cache_size: usize,
}

impl Default for FetchDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 0,
            retry_delay: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(5 * 60),
            cache_size: 100,
        }
    }
}

// == Fetch Options ==
/// Per-request settings. Unset values fall back to [`FetchDefaults`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cache: CacheStrategy,
    pub cache_ttl: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            timeout: None,
            retries: None,
            retry_delay: None,
            cache: CacheStrategy::default(),
            cache_ttl: None,
        }
    }
}

impl FetchOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = Some(retries);
        self.retry_delay = Some(delay);
        self
    }

    pub fn cache(mut self, strategy: CacheStrategy) -> Self {
        self.cache = strategy;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

// == Smart Fetcher ==
/// Queued, cached JSON fetching over an injected [`Transport`].
pub struct SmartFetcher {
    queue: RequestQueue,
    transport: Arc<dyn Transport>,
    memory: Mutex<TtlCache<Value>>,
    storage: Option<Arc<dyn Storage>>,
    defaults: FetchDefaults,
}

impl std::fmt::Debug for SmartFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartFetcher")
            .field("queue", &self.queue)
            .field("defaults", &self.defaults)
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}

impl SmartFetcher {
    // == Constructor ==
    pub fn new(queue: RequestQueue, transport: Arc<dyn Transport>, defaults: FetchDefaults) -> Self {
        let memory = TtlCache::new(CacheConfig {
            max_size: defaults.cache_size,
            default_ttl: defaults.cache_ttl.as_millis() as u64,
            ..CacheConfig::default()
        });
        Self {
            queue,
            transport,
            memory: Mutex::new(memory),
            storage: None,
            defaults,
        }
    }

    /// Enables [`CacheStrategy::Persistent`] using `storage`.
    ///
    /// Without storage, persistent requests use the in-process cache.
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn defaults(&self) -> &FetchDefaults {
        &self.defaults
    }

    // == Fetch ==
    /// Fetches `url` and decodes the body as JSON (`null` for an empty body).
    ///
    /// GET requests consult the cache first and, on success, write the
    /// decoded body back. Other methods always go to the network.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Value, FetchError> {
        let request = FetchRequest {
            url: url.to_string(),
            method: options.method,
            headers: options.headers,
            body: options.body,
        };
        let cacheable = options.cache != CacheStrategy::None && request.is_cacheable();

        if cacheable {
            if let Some(hit) = self.cached(url, options.cache) {
                debug!(url, "Serving response from cache");
                return Ok(hit);
            }
        }

        let timeout = options.timeout.unwrap_or(self.defaults.timeout);
        let retries = options.retries.unwrap_or(self.defaults.retries);
        let retry_delay = options.retry_delay.unwrap_or(self.defaults.retry_delay);
        let transport = Arc::clone(&self.transport);

        let response = self
            .queue
            .add(move || send_with_retries(transport, request, timeout, retries, retry_delay))
            .await??;
        let data = decode_body(&response)?;

        if cacheable {
            let ttl = options.cache_ttl.unwrap_or(self.defaults.cache_ttl);
            self.write_back(url, &data, options.cache, ttl);
        }
        Ok(data)
    }

    /// Like [`fetch`](Self::fetch), deserializing into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<T, FetchError> {
        let value = self.fetch(url, options).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
    }

    // == Prefetch ==
    /// Warms the cache for `urls`; returns how many fetches succeeded.
    pub async fn prefetch<I>(&self, urls: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let fetches = urls.into_iter().map(|url| {
            let url = url.as_ref().to_string();
            async move { self.fetch(&url, FetchOptions::default()).await }
        });
        join_all(fetches)
            .await
            .into_iter()
            .filter(|result| result.is_ok())
            .count()
    }

    // == Cache Management ==
    /// Empties the in-process response cache and every persisted response.
    pub fn clear_cache(&self) {
        self.memory.lock().clear();
        self.remove_persisted(|_| true);
    }

    /// Drops cached responses whose URL matches `pattern`, in memory and in
    /// storage. Returns how many were removed across both.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let in_memory = self.memory.lock().invalidate(pattern);
        in_memory + self.remove_persisted(|url| pattern.matches(url))
    }

    /// Statistics of the in-process response cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.memory.lock().stats()
    }

    /// Removes persisted slots whose URL satisfies `select`.
    fn remove_persisted(&self, select: impl Fn(&str) -> bool) -> usize {
        let Some(storage) = &self.storage else {
            return 0;
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Persisted responses not listed: {}", err);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let Some(url) = key.strip_prefix(PERSISTENT_KEY_PREFIX) else {
                continue;
            };
            if !select(url) {
                continue;
            }
            match storage.remove(&key) {
                Ok(()) => removed += 1,
                Err(err) => warn!(url, "Persisted response not removed: {}", err),
            }
        }
        removed
    }

    fn cached(&self, url: &str, strategy: CacheStrategy) -> Option<Value> {
        match (strategy, &self.storage) {
            (CacheStrategy::None, _) => None,
            (CacheStrategy::Persistent, Some(storage)) => read_persisted(storage.as_ref(), url),
            _ => self.memory.lock().get(url),
        }
    }

    fn write_back(&self, url: &str, data: &Value, strategy: CacheStrategy, ttl: Duration) {
        let ttl_ms = ttl.as_millis() as u64;
        match (strategy, &self.storage) {
            (CacheStrategy::None, _) => {}
            (CacheStrategy::Persistent, Some(storage)) => {
                let entry = CacheEntry::new(data, ttl_ms, current_timestamp_ms());
                let result = serde_json::to_string(&entry)
                    .map_err(|e| e.to_string())
                    .and_then(|raw| {
                        storage
                            .write(&persistent_key(url), &raw)
                            .map_err(|e| e.to_string())
                    });
                if let Err(err) = result {
                    warn!(url, "Response not cached: {}", err);
                }
            }
            _ => {
                self.memory.lock().set(url, data.clone(), Some(ttl_ms));
            }
        }
    }
}

fn persistent_key(url: &str) -> String {
    format!("{}{}", PERSISTENT_KEY_PREFIX, url)
}

fn read_persisted(storage: &dyn Storage, url: &str) -> Option<Value> {
    let key = persistent_key(url);
    let raw = match storage.read(&key) {
        Ok(raw) => raw?,
        Err(err) => {
            debug!(url, "Persisted response unreadable: {}", err);
            return None;
        }
    };
    match serde_json::from_str::<CacheEntry<Value>>(&raw) {
        Ok(entry) if !entry.is_expired() => Some(entry.data),
        _ => {
            // Expired or corrupt: drop the slot
            let _ = storage.remove(&key);
            None
        }
    }
}

/// Runs a request with up to `retries` extra attempts for retryable failures.
async fn send_with_retries(
    transport: Arc<dyn Transport>,
    request: FetchRequest,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
) -> Result<FetchResponse, FetchError> {
    let mut attempt = 0;
    loop {
        match send_once(transport.as_ref(), request.clone(), timeout).await {
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(url = %request.url, attempt, "Request failed, retrying: {}", err);
                tokio::time::sleep(retry_delay).await;
            }
            result => return result,
        }
    }
}

/// One attempt; the transport future is dropped if `timeout` elapses.
async fn send_once(
    transport: &dyn Transport,
    request: FetchRequest,
    timeout: Duration,
) -> Result<FetchResponse, FetchError> {
    let url = request.url.clone();
    let response = match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(FetchError::Timeout {
                url,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    };

    if !response.is_success() {
        return Err(FetchError::Status {
            url,
            status: response.status,
        });
    }
    Ok(response)
}

fn decode_body(response: &FetchResponse) -> Result<Value, FetchError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
}
