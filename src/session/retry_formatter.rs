//! Retry and failure log messages for the request loop.

use reqwest::StatusCode;
use std::time::Duration;

use crate::session::transport::TransportError;

/// What went wrong on an attempt, for log wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request exceeded its timeout
    NetworkTimeout,
    /// Connection refused or DNS failure
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 400
    InvalidRequest,
    /// HTTP 401 / 403
    AuthFailed(u16),
    /// Other 4xx
    ClientError(u16),
    /// Anything else
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "request timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "too many requests",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::InvalidRequest => "bad request",
            Self::AuthFailed(401) => "unauthorized",
            Self::AuthFailed(_) => "forbidden",
            Self::ClientError(404) => "not found",
            Self::ClientError(_) => "client error",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Hint shown with the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric => {
                "Check network connectivity to the API host"
            }
            Self::RateLimit => "Wait for the rate limit window to reset before retrying",
            Self::ServerError(_) => "The service may be degraded, try again later",
            Self::InvalidRequest | Self::ClientError(_) => {
                "Review the request path and parameters"
            }
            Self::AuthFailed(_) => "Check the access token, or run setup-auth with a new one",
        }
    }

    /// Whether the request loop retries this kind of failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidRequest | Self::AuthFailed(_) | Self::ClientError(_) | Self::RateLimit
        )
    }
}

/// One failed attempt, ready to be logged.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// 1-based attempt that just failed
    pub attempt: u32,
    /// Attempt budget of the request
    pub max_attempts: u32,
    /// Failure classification
    pub error_type: RetryErrorType,
    /// Delay before the next attempt
    pub backoff: Duration,
    /// Request path
    pub endpoint: String,
    /// Underlying error text
    pub error_message: String,
}

impl RetryContext {
    /// Build a context for a failed attempt.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff: Duration,
        endpoint: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff,
            endpoint: endpoint.into(),
            error_message: error_message.into(),
        }
    }

    /// Line logged before sleeping.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying {} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.endpoint,
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff.as_secs_f64()
        )
    }

    /// Multi-line summary logged when the request gives up.
    pub fn format_failure(&self) -> String {
        [
            format!(
                "[FAILED] {} failed after {} of {} attempts",
                self.endpoint, self.attempt, self.max_attempts
            ),
            format!("  Last error: {}", self.error_message),
            format!("  Suggestion: {}", self.error_type.suggestion()),
        ]
        .join("\n")
    }
}

/// Classify a failed attempt from its status or transport error.
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&TransportError>,
) -> RetryErrorType {
    if let Some(status) = status {
        let code = status.as_u16();
        return match code {
            400 => RetryErrorType::InvalidRequest,
            401 | 403 => RetryErrorType::AuthFailed(code),
            429 => RetryErrorType::RateLimit,
            _ if status.is_server_error() => RetryErrorType::ServerError(code),
            _ if status.is_client_error() => RetryErrorType::ClientError(code),
            _ => RetryErrorType::NetworkGeneric,
        };
    }

    match err {
        Some(TransportError::Timeout(_)) => RetryErrorType::NetworkTimeout,
        Some(TransportError::Connect(_)) => RetryErrorType::NetworkOffline,
        _ => RetryErrorType::NetworkGeneric,
    }
}
