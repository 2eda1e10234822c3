//! Pushes exported MISP events to a MISP instance

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::session::config::DEFAULT_TIMEOUT;
use crate::session::{HttpRequest, HttpTransport, ReqwestTransport, TransportError};

/// Errors from a MISP upload
#[derive(Debug, thiserror::Error)]
pub enum MispError {
    /// The API key is not a valid header value
    #[error("invalid MISP API key")]
    InvalidKey,

    /// No response received
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// MISP answered with a non-2xx status
    #[error("MISP returned {status}: {body}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// A bundle does not hold `response[*].Event`
    #[error("malformed MISP bundle: {0}")]
    Malformed(String),
}

/// Sends events to `<url>/events/add`
pub struct MispExporter {
    url: String,
    key: String,
    ignore_errors: bool,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for MispExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MispExporter")
            .field("url", &self.url)
            .field("ignore_errors", &self.ignore_errors)
            .finish_non_exhaustive()
    }
}

impl MispExporter {
    /// Exporter for the instance at `url`, authenticating with `key`
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            ignore_errors: false,
            transport: ReqwestTransport::shared_arc(),
        }
    }

    /// Log failed events and keep going instead of stopping
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Skip certificate verification (self-hosted instances)
    pub fn insecure(mut self) -> Result<Self, MispError> {
        self.transport = Arc::new(ReqwestTransport::insecure()?);
        Ok(self)
    }

    /// Send through a custom transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Instance URL, without trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send every event of every bundle; returns the number sent
    pub async fn send_bundles(&self, bundles: &[Value]) -> Result<usize, MispError> {
        let mut events = Vec::new();
        for bundle in bundles {
            let response = bundle
                .get("response")
                .and_then(Value::as_array)
                .ok_or_else(|| MispError::Malformed("missing 'response' list".to_string()))?;
            for item in response {
                let event = item
                    .get("Event")
                    .ok_or_else(|| MispError::Malformed("item without 'Event'".to_string()))?;
                events.push(event);
            }
        }

        let mut sent = 0;
        for event in events {
            if self.send_event(event).await? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Send one event
    ///
    /// Returns `false` when the event failed and errors are ignored.
    pub async fn send_event(&self, event: &Value) -> Result<bool, MispError> {
        match self.post_event(event).await {
            Ok(view_url) => {
                info!(url = %view_url, "Created MISP event");
                Ok(true)
            }
            Err(e) if self.ignore_errors => {
                error!(error = %e, "Failed to send MISP event");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn post_event(&self, event: &Value) -> Result<String, MispError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&self.key).map_err(|_| MispError::InvalidKey)?;
        key.set_sensitive(true);
        headers.insert(AUTHORIZATION, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .transport
            .send(HttpRequest {
                method: Method::POST,
                url: format!("{}/events/add", self.url),
                headers,
                body: Some(event.clone()),
                timeout: DEFAULT_TIMEOUT,
            })
            .await?;

        if !response.is_success() {
            return Err(MispError::Rejected {
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        let created: Value = serde_json::from_str(&response.body)
            .map_err(|e| MispError::Malformed(format!("invalid response: {e}")))?;
        let id = match created.pointer("/Event/id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(MispError::Malformed("response has no Event.id".to_string())),
        };
        Ok(format!("{}/events/view/{id}", self.url))
    }
}
