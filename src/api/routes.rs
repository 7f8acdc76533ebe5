//! API Routes
//!
//! Configures the Axum router with all inspection endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, exists_handler, export_handler, fetch_handler,
    fetch_stats_handler, get_config_handler, get_handler, health_handler, import_handler,
    invalidate_handler, preload_handler, set_handler, stats_handler, update_config_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/entries", put(set_handler))
        .route("/entries/preload", post(preload_handler))
        .route("/entries/:key", get(get_handler).delete(delete_handler))
        .route("/entries/:key/exists", get(exists_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/clear", post(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/config", get(get_config_handler).patch(update_config_handler))
        .route("/snapshot", get(export_handler).put(import_handler))
        .route("/fetch", post(fetch_handler))
        .route("/fetch/stats", get(fetch_stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
