//! Response DTOs for the inspection API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, PersistOutcome};

/// Response body for GET /entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /entries
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// What happened to the snapshot write
    pub persistence: PersistOutcome,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, persistence: PersistOutcome) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            persistence,
        }
    }
}

/// Response body for DELETE /entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /entries/:key/exists
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

/// Response body for POST /entries/preload
#[derive(Debug, Clone, Serialize)]
pub struct PreloadResponse {
    pub inserted: usize,
}

/// Response body for PUT /snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub restored: usize,
}

/// Response body for POST /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub persistence: PersistOutcome,
}

impl ClearResponse {
    pub fn new(persistence: PersistOutcome) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            persistence,
        }
    }
}

/// Queue occupancy for GET /fetch/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub max_concurrent: usize,
    pub running: usize,
    pub pending: usize,
}

/// Response body for GET /fetch/stats
#[derive(Debug, Clone, Serialize)]
pub struct FetchStatsResponse {
    pub queue: QueueStatus,
    pub cache: CacheStats,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
