//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache's counting, capacity, eviction and
//! snapshot laws over generated operation sequences.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::thread::sleep;
use std::time::Duration;

use crate::cache::{CacheConfig, EvictionPolicy, KeyPattern, TtlCache};

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 100;

fn cache_with(max_size: usize, policy: EvictionPolicy) -> TtlCache<String> {
    TtlCache::new(CacheConfig {
        max_size,
        eviction_policy: policy,
        ..CacheConfig::default()
    })
}

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,32}".prop_map(|s| s)
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}".prop_map(|s| s)
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Ttl),
    ]
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so gets and deletes actually hit
    let key = "[a-e]{1,2}";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Request accounting: every get is exactly one hit or one miss, and the
    // reported size tracks the map after every operation.
    #[test]
    fn prop_statistics_accuracy(
        ops in prop::collection::vec(cache_op_strategy(), 1..60),
        policy in policy_strategy(),
    ) {
        let mut cache = cache_with(8, policy);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key, value, None);
                }
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }

            let stats = cache.stats();
            prop_assert_eq!(stats.total_requests, stats.total_hits + stats.total_misses);
            prop_assert_eq!(stats.size, cache.len());
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.total_hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.total_misses, expected_misses, "Misses mismatch");
        if stats.total_requests > 0 {
            prop_assert!((stats.hit_rate + stats.miss_rate - 100.0).abs() < 1e-6);
        }
    }

    // Storing a pair and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let mut cache = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);

        cache.set(key.clone(), value.clone(), None);

        prop_assert_eq!(cache.get(&key), Some(value), "Round-trip value mismatch");
    }

    // A second set replaces the value and resets the access metadata.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy(),
        reads in 0usize..5,
    ) {
        let mut cache = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);

        cache.set(key.clone(), value1, None);
        for _ in 0..reads {
            cache.get(&key);
        }
        cache.set(key.clone(), value2.clone(), None);

        prop_assert_eq!(cache.peek(&key).map(|e| e.access_count), Some(0));
        prop_assert_eq!(cache.get(&key), Some(value2), "Overwrite should return new value");
        prop_assert_eq!(cache.len(), 1, "Should have exactly one entry after overwrite");
    }

    // Whatever the policy, the cache never holds more than max_size entries.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200),
        max_size in 1usize..40,
        policy in policy_strategy(),
    ) {
        let mut cache = cache_with(max_size, policy);

        for (key, value) in entries {
            cache.set(key, value, None);
            prop_assert!(
                cache.len() <= max_size,
                "Cache size {} exceeds max {}",
                cache.len(),
                max_size
            );
        }
    }

    // Under lru the evicted key is always the one touched longest ago.
    #[test]
    fn prop_lru_evicts_least_recently_accessed(
        keys in prop::collection::hash_set("[a-z]{1,6}", 3..10),
        touches in prop::collection::vec(0usize..100, 0..20),
        new_key in "[A-Z]{1,6}",
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let capacity = keys.len();
        let mut cache = cache_with(capacity, EvictionPolicy::Lru);

        // Front of `order` is the least recently touched key
        let mut order: Vec<String> = Vec::new();
        for key in &keys {
            cache.set(key.clone(), format!("value_{}", key), None);
            order.push(key.clone());
        }
        for index in touches {
            let key = keys[index % keys.len()].clone();
            prop_assert!(cache.get(&key).is_some());
            order.retain(|k| k != &key);
            order.push(key);
        }

        cache.set(new_key.clone(), "new".to_string(), None);

        prop_assert_eq!(cache.len(), capacity);
        prop_assert!(!cache.has(&order[0]), "Key '{}' should have been evicted", order[0]);
        for key in order.iter().skip(1) {
            prop_assert!(cache.has(key), "Key '{}' should still exist", key);
        }
        prop_assert!(cache.has(&new_key));
    }

    // Exporting and importing into a fresh cache reproduces the live pairs.
    #[test]
    fn prop_export_import_roundtrip(
        entries in prop::collection::hash_map(key_strategy(), value_strategy(), 0..30),
    ) {
        let mut source = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);
        for (key, value) in &entries {
            source.set(key.clone(), value.clone(), None);
        }

        let exported = source.export().unwrap();
        let mut target = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);
        let restored = target.import(&exported).unwrap();

        prop_assert_eq!(restored, entries.len());
        let restored_keys: HashSet<&String> = target.keys().collect();
        let expected_keys: HashSet<&String> = entries.keys().collect();
        prop_assert_eq!(restored_keys, expected_keys);
        for (key, value) in &entries {
            let got = target.get(key);
            prop_assert_eq!(got.as_ref(), Some(value));
        }
    }

    // A regex invalidation removes exactly the matching keys.
    #[test]
    fn prop_invalidate_regex_exact(
        user_keys in prop::collection::hash_set("user:[0-9]{1,4}", 0..15),
        other_keys in prop::collection::hash_set("(team|league|xuser):[0-9]{1,4}", 0..15),
    ) {
        let mut cache = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);
        for key in user_keys.iter().chain(other_keys.iter()) {
            cache.set(key.clone(), "v".to_string(), None);
        }

        let pattern = KeyPattern::regex("^user:").unwrap();
        let removed = cache.invalidate(&pattern);

        prop_assert_eq!(removed, user_keys.len());
        prop_assert_eq!(cache.stats().evictions, user_keys.len() as u64);
        for key in &user_keys {
            prop_assert!(!cache.has(key));
        }
        for key in &other_keys {
            prop_assert!(cache.has(key));
        }
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // Before the TTL elapses get returns the value; afterwards it misses and
    // the expired entry counts as one eviction.
    #[test]
    fn prop_ttl_expiration_behavior(key in key_strategy(), value in value_strategy()) {
        let mut cache = cache_with(TEST_MAX_SIZE, EvictionPolicy::Lru);

        cache.set(key.clone(), value.clone(), Some(60));
        prop_assert_eq!(cache.get(&key), Some(value), "Entry should exist before TTL expires");

        sleep(Duration::from_millis(100));

        prop_assert_eq!(cache.get(&key), None, "Entry should not be found after TTL expires");
        prop_assert_eq!(cache.stats().evictions, 1);
    }
}

// == Property Test for Error Response Format ==
// This tests the CacheError -> HTTP response conversion

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error becomes a JSON body with a string "error" field.
    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}") {
        use crate::error::{CacheError, FetchError};
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::NotFound(error_msg.clone()),
            CacheError::InvalidRequest(error_msg.clone()),
            CacheError::Storage(crate::error::StorageError::QuotaExceeded {
                needed: error_msg.len(),
                limit: 0,
            }),
            CacheError::Fetch(FetchError::Transport(error_msg.clone())),
        ];

        let rt = tokio::runtime::Runtime::new().unwrap();
        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = rt.block_on(async { to_bytes(response.into_body(), usize::MAX).await.unwrap() });
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}

// == Property Test for Shared Access ==
// Operations interleaved through Arc<RwLock<TtlCache>> keep the counters consistent

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_shared_access_consistency(
        initial in prop::collection::vec((key_strategy(), value_strategy()), 1..20),
        operations in prop::collection::vec(cache_op_strategy(), 10..50),
    ) {
        use std::sync::Arc;
        use tokio::sync::RwLock;

        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Arc::new(RwLock::new(cache_with(16, EvictionPolicy::Lru)));
            {
                let mut guard = cache.write().await;
                for (key, value) in &initial {
                    guard.set(key.clone(), value.clone(), None);
                }
            }

            let written: HashMap<String, HashSet<String>> = operations
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Set { key, value } => Some((key.clone(), value.clone())),
                    _ => None,
                })
                .chain(initial.iter().cloned())
                .fold(HashMap::new(), |mut acc, (k, v)| {
                    acc.entry(k).or_insert_with(HashSet::new).insert(v);
                    acc
                });

            let mut handles = vec![];
            for op in operations {
                let cache = Arc::clone(&cache);
                let written = written.clone();
                handles.push(tokio::spawn(async move {
                    let mut guard = cache.write().await;
                    match op {
                        CacheOp::Set { key, value } => {
                            guard.set(key, value, None);
                        }
                        CacheOp::Get { key } => {
                            if let Some(value) = guard.get(&key) {
                                // A read only ever returns a value that was written for that key
                                let known = written.get(&key).map(|vs| vs.contains(&value));
                                if known != Some(true) {
                                    return Err(format!("Unexpected value for '{}': {}", key, value));
                                }
                            }
                        }
                        CacheOp::Delete { key } => {
                            guard.delete(&key);
                        }
                    }
                    Ok::<_, String>(())
                }));
            }

            for handle in handles {
                let result = handle.await.expect("Task should not panic");
                prop_assert!(result.is_ok(), "Shared operation failed: {:?}", result);
            }

            let guard = cache.read().await;
            let stats = guard.stats();
            prop_assert!(stats.size <= 16);
            prop_assert_eq!(stats.total_requests, stats.total_hits + stats.total_misses);
            prop_assert!(stats.hit_rate >= 0.0 && stats.hit_rate <= 100.0);
            Ok(())
        })?;
    }
}
