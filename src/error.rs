//! Error types for the cache, the request queue and the smart fetcher
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache operations and the inspection API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (absent or expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalidation pattern is not a valid regular expression
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing storage slot failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Outbound fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

// == Storage Error Enum ==
/// Failures of a key-value storage slot.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying filesystem failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Writing would exceed the storage quota
    #[error("Quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },
}

// == Queue Error Enum ==
/// Reasons a queued task never produced a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Task was dropped by `clear()` before it started
    #[error("Task was cancelled before it started")]
    Cancelled,

    /// Task panicked while running
    #[error("Task panicked while running")]
    Panicked,

    /// Task was added outside a tokio runtime and never enqueued
    #[error("No tokio runtime to run the task on")]
    NoRuntime,
}

// == Fetch Error Enum ==
/// Failures surfaced by the smart fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request was aborted after its timeout elapsed
    #[error("Request to {url} aborted after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Transport-level failure (connection refused, DNS, ...)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Response body is not valid JSON for the requested type
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Request never ran to completion inside the queue
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl FetchError {
    /// True when the request was aborted by its timeout.
    pub fn is_abort(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// True for failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Decode(_) | FetchError::Queue(_) => false,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidPattern(_) => StatusCode::BAD_REQUEST,
            CacheError::Serialization(_) => StatusCode::BAD_REQUEST,
            CacheError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Fetch(err) if err.is_abort() => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
