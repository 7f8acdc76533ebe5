//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::{Deserialize, Serialize};

// == Cache Stats ==
/// Running cache counters.
///
/// `total_requests` always equals `total_hits + total_misses`; the two rates
/// are percentages that sum to 100 once any request has been recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of `get` calls
    pub total_requests: u64,
    /// Number of `get` calls that returned a value
    pub total_hits: u64,
    /// Number of `get` calls that found nothing (absent or expired)
    pub total_misses: u64,
    /// Hits as a percentage of requests
    pub hit_rate: f64,
    /// Misses as a percentage of requests
    pub miss_rate: f64,
    /// Entries removed by expiry, eviction or invalidation
    pub evictions: u64,
    /// Current number of entries in the cache
    pub size: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Counts a request that was served from the cache.
    pub fn record_hit(&mut self) {
        self.total_requests += 1;
        self.total_hits += 1;
        self.recompute_rates();
    }

    // == Record Miss ==
    /// Counts a request that found nothing.
    pub fn record_miss(&mut self) {
        self.total_requests += 1;
        self.total_misses += 1;
        self.recompute_rates();
    }

    // == Record Evictions ==
    /// Adds `count` removed entries to the eviction counter.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    // == Update Size ==
    /// Updates the current entry count.
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    fn recompute_rates(&mut self) {
        if self.total_requests == 0 {
            self.hit_rate = 0.0;
            self.miss_rate = 0.0;
            return;
        }
        let total = self.total_requests as f64;
        self.hit_rate = self.total_hits as f64 / total * 100.0;
        self.miss_rate = self.total_misses as f64 / total * 100.0;
    }
}
