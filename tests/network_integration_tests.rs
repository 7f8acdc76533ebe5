//! Integration Tests for the request queue and the smart fetcher
//!
//! Drives both through the public API only, with a scripted transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use smart_cache::{
    cache::{CacheConfig, KeyPattern, TtlCache},
    error::{FetchError, QueueError},
    network::{
        CacheStrategy, FetchDefaults, FetchOptions, FetchRequest, FetchResponse, RequestQueue,
        SmartFetcher, Transport,
    },
};
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

// == Queue Scenarios ==

#[tokio::test]
async fn test_five_tasks_two_slots() {
    let queue = RequestQueue::new(2);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let active = active.clone();
            let peak = peak.clone();
            let started = started.clone();
            queue.add(move || async move {
                started.lock().push(i);
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(25)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                i * 10
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    assert_eq!(results, vec![Ok(0), Ok(10), Ok(20), Ok(30), Ok(40)]);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(*started.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(queue.running(), 0);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_clear_cancels_waiting_callers() {
    let queue = RequestQueue::new(1);

    let running = queue.add(|| async {
        sleep(Duration::from_millis(30)).await;
        "finished"
    });
    let waiting = queue.add(|| async { "never" });
    assert_eq!(queue.pending(), 1);

    queue.clear();

    assert_eq!(assert_ok!(running.await), "finished");
    assert_eq!(assert_err!(waiting.await), QueueError::Cancelled);
}

// == Fetcher Scenarios ==

/// Pops scripted replies, then echoes the URL.
#[derive(Default)]
struct ScriptedTransport {
    calls: AtomicUsize,
    delay: Duration,
    script: Mutex<VecDeque<Result<FetchResponse, FetchError>>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(FetchResponse::new(
                200,
                json!({ "url": request.url }).to_string(),
            ))
        })
    }
}

fn fetcher_with(transport: Arc<ScriptedTransport>, max_concurrent: usize) -> SmartFetcher {
    SmartFetcher::new(
        RequestQueue::new(max_concurrent),
        transport,
        FetchDefaults::default(),
    )
}

#[tokio::test]
async fn test_cache_then_fetch_then_write_back() {
    // Caller-side composition: cache miss, fetch, store
    let transport = Arc::new(ScriptedTransport::default());
    let fetcher = fetcher_with(transport.clone(), 6);
    let mut cache: TtlCache<serde_json::Value> = TtlCache::new(CacheConfig::default());
    let url = "http://api.test/leaderboard";

    let value = match cache.get(url) {
        Some(hit) => hit,
        None => {
            let fetched = assert_ok!(fetcher.fetch(url, FetchOptions::default()).await);
            cache.set(url, fetched.clone(), None);
            fetched
        }
    };

    assert_eq!(value["url"], url);
    assert_eq!(cache.get(url), Some(value));
    assert_eq!(cache.stats().total_hits, 1);
    assert_eq!(cache.stats().total_misses, 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timeout_reports_abort_and_frees_slot() {
    let transport = Arc::new(ScriptedTransport {
        delay: Duration::from_millis(200),
        ..Default::default()
    });
    let fetcher = fetcher_with(transport, 1);

    let options = FetchOptions::default()
        .timeout(Duration::from_millis(20))
        .cache(CacheStrategy::None);
    let err = assert_err!(fetcher.fetch("http://api.test/slow", options).await);

    assert!(err.is_abort());
    assert_eq!(fetcher.queue().running(), 0);
}

#[tokio::test]
async fn test_server_error_retried_then_surfaced() {
    let transport = Arc::new(ScriptedTransport {
        script: Mutex::new(
            vec![
                Ok(FetchResponse::new(500, "")),
                Ok(FetchResponse::new(502, "")),
            ]
            .into(),
        ),
        ..Default::default()
    });
    let fetcher = fetcher_with(transport.clone(), 2);

    let options = FetchOptions::default().retries(1, Duration::from_millis(5));
    let err = assert_err!(fetcher.fetch("http://api.test/broken", options).await);

    assert!(matches!(err, FetchError::Status { status: 502, .. }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.cache_stats().size, 0);
}

#[tokio::test]
async fn test_prefetch_then_invalidate_by_regex() {
    let transport = Arc::new(ScriptedTransport::default());
    let fetcher = fetcher_with(transport.clone(), 3);

    let urls = [
        "http://api.test/players/1",
        "http://api.test/players/2",
        "http://api.test/teams/1",
    ];
    assert_eq!(fetcher.prefetch(urls).await, 3);

    let pattern = assert_ok!(KeyPattern::regex(r"/players/\d+$"));
    assert_eq!(fetcher.invalidate(&pattern), 2);

    assert_ok!(fetcher.fetch(urls[2], FetchOptions::default()).await);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
}
