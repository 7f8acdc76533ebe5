//! API Handlers
//!
//! HTTP request handlers for the cache and fetcher inspection endpoints.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheConfig, CacheConfigPatch, CacheStats, Storage, TtlCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, ExistsResponse, FetchRequestBody, FetchStatsResponse,
    GetResponse, HealthResponse, ImportResponse, InvalidateRequest, InvalidateResponse,
    PreloadRequest, PreloadResponse, QueueStatus, SetRequest, SetResponse,
};
use crate::network::{FetchOptions, HttpTransport, RequestQueue, SmartFetcher};

/// Application state shared across all handlers.
///
/// The cache sits behind an async RwLock; the fetcher synchronizes itself.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RwLock<TtlCache<Value>>>,
    pub fetcher: Arc<SmartFetcher>,
}

impl AppState {
    pub fn new(cache: TtlCache<Value>, fetcher: SmartFetcher) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The cache restores its snapshot from `storage` when persistence is
    /// enabled; the fetcher talks HTTP and keeps persistent responses there too.
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> Self {
        let cache = TtlCache::with_storage(config.cache_config(), Arc::clone(&storage));
        let fetcher = SmartFetcher::new(
            RequestQueue::new(config.max_concurrent),
            Arc::new(HttpTransport::new()),
            config.fetch_defaults(),
        )
        .with_storage(storage);
        Self::new(cache, fetcher)
    }
}

// == Entries ==

/// Handler for PUT /entries
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut cache = state.cache.write().await;
    let persistence = cache.set(req.key.clone(), req.value, req.ttl);

    Ok(Json(SetResponse::new(req.key, persistence)))
}

/// Handler for GET /entries/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a hit updates access metadata and stats
    let mut cache = state.cache.write().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for GET /entries/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ExistsResponse> {
    let exists = state.cache.read().await.has(&key);
    Json(ExistsResponse { key, exists })
}

/// Handler for DELETE /entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /entries/preload
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> Json<PreloadResponse> {
    let inserted = state.cache.write().await.preload(req.entries);
    Json(PreloadResponse { inserted })
}

// == Bulk Operations ==

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let pattern = req.to_pattern()?;
    let removed = state.cache.write().await.invalidate(&pattern);
    info!(removed, "Invalidated entries");

    Ok(Json(InvalidateResponse { removed }))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let persistence = state.cache.write().await.clear();
    Json(ClearResponse::new(persistence))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.read().await.stats())
}

// == Config ==

/// Handler for GET /config
pub async fn get_config_handler(State(state): State<AppState>) -> Json<CacheConfig> {
    Json(state.cache.read().await.config().clone())
}

/// Handler for PATCH /config
pub async fn update_config_handler(
    State(state): State<AppState>,
    Json(patch): Json<CacheConfigPatch>,
) -> Result<Json<CacheConfig>> {
    let mut cache = state.cache.write().await;
    cache.update_config(patch)?;

    Ok(Json(cache.config().clone()))
}

// == Snapshot ==

/// Handler for GET /snapshot
pub async fn export_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let snapshot = state.cache.read().await.export()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], snapshot))
}

/// Handler for PUT /snapshot
///
/// Takes the raw body so the exported document can be sent back unchanged.
pub async fn import_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>> {
    let restored = state.cache.write().await.import(&body)?;
    Ok(Json(ImportResponse { restored }))
}

// == Fetch ==

/// Handler for POST /fetch
pub async fn fetch_handler(
    State(state): State<AppState>,
    Json(req): Json<FetchRequestBody>,
) -> Result<Json<Value>> {
    req.validate()?;

    let mut options = FetchOptions::default().method(req.method()?);
    if let Some(strategy) = req.cache {
        options = options.cache(strategy);
    }
    if let Some(ttl) = req.ttl {
        options = options.cache_ttl(Duration::from_millis(ttl));
    }

    let data = state.fetcher.fetch(&req.url, options).await?;
    Ok(Json(data))
}

/// Handler for GET /fetch/stats
pub async fn fetch_stats_handler(State(state): State<AppState>) -> Json<FetchStatsResponse> {
    let queue = state.fetcher.queue();
    Json(FetchStatsResponse {
        queue: QueueStatus {
            max_concurrent: queue.max_concurrent(),
            running: queue.running(),
            pending: queue.pending(),
        },
        cache: state.fetcher.cache_stats(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
