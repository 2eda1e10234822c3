//! HTTP transport seam
//!
//! The session talks to the network through [`HttpTransport`] so the retry,
//! refresh and pagination logic can run against scripted responses.
//! [`ReqwestTransport`] is the production implementation and shares one
//! connection pool across every session in the process.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::session::config::HTTP_CONNECT_TIMEOUT;

/// Process-wide HTTP client so connection pooling works across sessions
static GLOBAL_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build configured HTTP client ({e}), using defaults");
            Client::new()
        })
});

/// A fully built request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Timeout for this single request
    pub timeout: Duration,
}

impl HttpRequest {
    /// Value of a request header as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A received response, body read to text
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    /// Build a response with no headers
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Build a response with a JSON body
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Add a header, ignoring names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Value of a response header as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Transport-level failures (no HTTP status received)
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, TLS failure
    #[error("connection failed: {0}")]
    Connect(String),

    /// Anything else
    #[error("network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Sends one HTTP request, no retries
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and read the full body
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Transport on the shared process-wide client
    pub fn shared() -> Self {
        Self {
            client: GLOBAL_HTTP_CLIENT.clone(),
        }
    }

    /// Transport on a custom client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Transport that skips TLS certificate verification
    ///
    /// Only meant for self-hosted endpoints with private certificates.
    pub fn insecure() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }

    /// Shared transport as a trait object
    pub fn shared_arc() -> Arc<dyn HttpTransport> {
        Arc::new(Self::shared())
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::shared()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
