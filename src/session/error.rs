//! API error taxonomy
//!
//! HTTP failures are wrapped with the status, the canonical reason and the
//! service-provided `errorId` / `errorMessage` when the body carries them.

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

use crate::identifier::IdentifierError;
use crate::session::transport::{HttpResponse, TransportError};

/// Message used when a request is refused locally because the client is rate limited
pub const LOCAL_RATE_LIMIT_MESSAGE: &str = "Request Aborted: Client is rate limited";

/// Details of a failed HTTP exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetails {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase of the status
    pub reason: String,
    /// Service-provided error id
    pub error_id: Option<String>,
    /// Service-provided error message
    pub error_message: Option<String>,
    /// Raw response body
    pub body: String,
}

impl ApiErrorDetails {
    /// Extract details from a failed response
    pub fn from_response(response: &HttpResponse) -> Self {
        let info: Option<Value> = serde_json::from_str(&response.body).ok();
        let field = |name: &str| {
            info.as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            status: response.status.as_u16(),
            reason: response
                .status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
            error_id: field("errorId"),
            error_message: field("errorMessage"),
            body: response.body.clone(),
        }
    }

    /// Details for a request refused before reaching the network
    pub fn rate_limited_locally() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            reason: "too many requests".to_string(),
            error_id: None,
            error_message: Some(LOCAL_RATE_LIMIT_MESSAGE.to_string()),
            body: String::new(),
        }
    }

    /// Reason phrase, suffixed with the service message when present
    pub fn reason(&self) -> String {
        match &self.error_message {
            Some(message) => format!("{}: {message}", self.reason),
            None => self.reason.clone(),
        }
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.reason())?;
        if let Some(id) = &self.error_id {
            write!(f, " (error id {id})")?;
        }
        Ok(())
    }
}

/// Errors returned by session requests
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// HTTP 400
    #[error("bad request: {0}")]
    BadRequest(ApiErrorDetails),

    /// HTTP 401 (after any refresh attempt)
    #[error("unauthorized: {0}")]
    Unauthorized(ApiErrorDetails),

    /// HTTP 429, or refused locally while the client is rate limited
    #[error("rate limited: {0}")]
    RateLimited(ApiErrorDetails),

    /// HTTP 500
    #[error("server error: {0}")]
    ServerError(ApiErrorDetails),

    /// Any other non-2xx status
    #[error("HTTP error: {0}")]
    Http(ApiErrorDetails),

    /// No response received
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Caller error detected before sending anything
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<IdentifierError> for ApiError {
    fn from(e: IdentifierError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

/// Result type for session operations
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Classify a failed response by status code
    pub fn from_response(response: &HttpResponse) -> Self {
        let details = ApiErrorDetails::from_response(response);
        match response.status {
            StatusCode::BAD_REQUEST => ApiError::BadRequest(details),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(details),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(details),
            StatusCode::INTERNAL_SERVER_ERROR => ApiError::ServerError(details),
            _ => ApiError::Http(details),
        }
    }

    /// Local rate limit refusal
    pub fn rate_limited_locally() -> Self {
        ApiError::RateLimited(ApiErrorDetails::rate_limited_locally())
    }

    /// HTTP details, for errors that wrap a status
    pub fn details(&self) -> Option<&ApiErrorDetails> {
        match self {
            ApiError::BadRequest(d)
            | ApiError::Unauthorized(d)
            | ApiError::RateLimited(d)
            | ApiError::ServerError(d)
            | ApiError::Http(d) => Some(d),
            ApiError::Connection(_) | ApiError::Parse(_) | ApiError::InvalidRequest(_) => None,
        }
    }

    /// HTTP status, for errors that wrap one
    pub fn status(&self) -> Option<u16> {
        self.details().map(|d| d.status)
    }

    /// Whether the request loop may try again after this error
    ///
    /// Transport failures and 5xx are transient. 4xx are caller mistakes,
    /// and a local rate limit refusal must be waited out by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Connection(_) => true,
            ApiError::ServerError(_) => true,
            ApiError::Http(d) => d.status >= 500,
            ApiError::BadRequest(_)
            | ApiError::Unauthorized(_)
            | ApiError::RateLimited(_)
            | ApiError::Parse(_)
            | ApiError::InvalidRequest(_) => false,
        }
    }
}
