//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries, so memory
//! is reclaimed even for keys nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;

/// Interval used when none is configured
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between runs
/// and taking the write lock only for the duration of a sweep. Every removed
/// entry is counted as an eviction.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(TtlCache::<String>::default()));
/// let sweep_handle = spawn_sweep_task(cache.clone(), DEFAULT_SWEEP_INTERVAL);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<T>(cache: Arc<RwLock<TtlCache<T>>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.sweep_expired()
            };

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
