//! Transport Module
//!
//! The seam between the smart fetcher and the network. Requests and
//! responses are passed through as-is; timeouts, queuing and caching live in
//! the fetcher.

use async_trait::async_trait;
use reqwest::Method;

use crate::error::FetchError;

// == Fetch Request ==
/// An outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    /// A bodiless GET for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    /// True when the response body may be cached under the bare URL.
    ///
    /// Only GET qualifies: HEAD has no body and write verbs change state.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

// == Fetch Response ==
/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Transport Trait ==
/// Sends a single request. Implementations must be cancel-safe: the fetcher
/// drops the returned future when a timeout fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

// == HTTP Transport ==
/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxies, default headers, TLS settings).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(FetchResponse { status, body })
    }
}
