//! Request DTOs for the inspection API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::KeyPattern;
use crate::error::{CacheError, Result};
use crate::network::CacheStrategy;

/// Request body for PUT /entries
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in milliseconds (uses the configured default if absent)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /entries/preload
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadRequest {
    /// Inserted in key order
    pub entries: BTreeMap<String, Value>,
}

/// Request body for POST /invalidate
///
/// No pattern removes every entry. `regex: true` compiles `pattern` as a
/// regular expression, otherwise it is matched as a substring.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvalidateRequest {
    pub pattern: Option<String>,
    pub regex: bool,
}

impl InvalidateRequest {
    pub fn to_pattern(&self) -> Result<KeyPattern> {
        match &self.pattern {
            None => Ok(KeyPattern::All),
            Some(pattern) if self.regex => KeyPattern::regex(pattern),
            Some(pattern) => Ok(KeyPattern::from(pattern.as_str())),
        }
    }
}

/// Request body for POST /fetch
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequestBody {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub cache: Option<CacheStrategy>,
    /// Response cache TTL in milliseconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl FetchRequestBody {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(CacheError::InvalidRequest(format!(
                "Unsupported URL: {}",
                self.url
            )));
        }
        Ok(())
    }

    /// Parsed method, GET when absent.
    pub fn method(&self) -> Result<reqwest::Method> {
        match &self.method {
            None => Ok(reqwest::Method::GET),
            Some(method) => method
                .to_ascii_uppercase()
                .parse()
                .map_err(|_| CacheError::InvalidRequest(format!("Invalid method: {}", method))),
        }
    }
}
