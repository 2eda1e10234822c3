//! Feedly API session
//!
//! [`FeedlySession`] owns the credential and the rate limiter, builds request
//! URLs, and runs every call through one retry loop:
//!
//! - refuse locally while the rate limiter reports the client as limited
//! - retry transport failures and 5xx with exponential backoff (1s, 2s, 4s, ...)
//! - fail 4xx immediately; a 401 triggers at most one token refresh per 24h
//! - a 429 forces the limiter into a cool-down when the headers did not

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::data::FeedlyUser;
use crate::metrics::{self, RequestMetrics};
use crate::session::auth::{persist_auth_token, Auth};
use crate::session::config::{
    backoff_delay, API_PREFIX, AUTH_PREFIX, AUTH_TOKEN_PATH, DEFAULT_API_HOST,
    DEFAULT_CLIENT_NAME, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT, MAX_ATTEMPTS, MIN_ATTEMPTS,
    RATE_LIMIT_COOL_DOWN, TOKEN_REFRESH_INTERVAL,
};
use crate::session::error::{ApiError, ApiErrorDetails, ApiResult};
use crate::session::rate_limit::RateLimiter;
use crate::session::retry_formatter::{extract_error_type, RetryContext};
use crate::session::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// Session shared between entities, cursors and registries
pub type SharedSession = Arc<FeedlySession>;

/// Per-call overrides for [`FeedlySession::request`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; GET without body, POST with body when unset
    pub method: Option<Method>,
    /// JSON body
    pub body: Option<Value>,
    /// Per-attempt timeout; session default when unset
    pub timeout: Option<Duration>,
    /// Attempt budget in `1..=10`; session default when unset
    pub max_attempts: Option<u32>,
}

impl RequestOptions {
    /// GET with session defaults
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with a JSON body
    pub fn post(body: Value) -> Self {
        Self {
            method: Some(Method::POST),
            body: Some(body),
            ..Self::default()
        }
    }

    /// PUT with a JSON body
    pub fn put(body: Value) -> Self {
        Self {
            method: Some(Method::PUT),
            body: Some(body),
            ..Self::default()
        }
    }

    /// DELETE without body
    pub fn delete() -> Self {
        Self {
            method: Some(Method::DELETE),
            ..Self::default()
        }
    }

    /// Override the HTTP method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// A validated request, reused across attempts and after a token refresh
#[derive(Debug, Clone)]
struct PreparedRequest {
    path: String,
    url: String,
    method: Method,
    body: Option<Value>,
    timeout: Duration,
    max_attempts: u32,
}

enum AttemptFailure {
    Status(HttpResponse),
    Transport(TransportError),
}

impl AttemptFailure {
    fn message(&self) -> String {
        match self {
            AttemptFailure::Status(response) => ApiErrorDetails::from_response(response).to_string(),
            AttemptFailure::Transport(err) => err.to_string(),
        }
    }
}

/// Authenticated client for the `/v3/` REST API
pub struct FeedlySession {
    transport: Arc<dyn HttpTransport>,
    api_host: String,
    client_name: String,
    user_id: Option<String>,
    timeout: Duration,
    max_attempts: u32,
    auth: Mutex<Auth>,
    rate_limiter: RateLimiter,
    last_refresh_attempt: Mutex<Option<Instant>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for FeedlySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedlySession")
            .field("api_host", &self.api_host)
            .field("client_name", &self.client_name)
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl FeedlySession {
    /// Session on the shared reqwest transport with default settings
    pub fn new(auth: Auth) -> Self {
        Self {
            transport: ReqwestTransport::shared_arc(),
            api_host: DEFAULT_API_HOST.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            user_id: None,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            auth: Mutex::new(auth),
            rate_limiter: RateLimiter::new(),
            last_refresh_attempt: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Session for a bare access token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Auth::new(token))
    }

    /// Use another API host (scheme and authority, no trailing slash needed)
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.set_api_host(api_host);
        self
    }

    /// Change the API host in place
    pub fn set_api_host(&mut self, api_host: impl Into<String>) {
        self.api_host = api_host.into().trim_end_matches('/').to_string();
    }

    /// Identify the application in the `client` query parameter
    pub fn with_client_name(mut self, client_name: impl Into<String>) -> ApiResult<Self> {
        let client_name = client_name.into();
        if client_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "a client name is required to identify the application".to_string(),
            ));
        }
        self.client_name = client_name;
        Ok(self)
    }

    /// Known user id, which avoids a profile request for `user().id()`
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Replace the HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Default per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default attempt budget, validated per request
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Wrap in an [`Arc`] for entities and cursors
    pub fn into_shared(self) -> SharedSession {
        Arc::new(self)
    }

    /// Handle on the authenticated user
    ///
    /// Each call returns a fresh handle with empty caches; keep the handle
    /// to reuse its profile and registries.
    pub fn user(self: &Arc<Self>) -> FeedlyUser {
        FeedlyUser::new(Arc::clone(self), self.user_id.clone())
    }

    /// API host
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Value of the `client` query parameter
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Configured user id
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Default per-attempt timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Default attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The session's rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Current access token
    pub fn auth_token(&self) -> Option<String> {
        self.auth().auth_token().map(str::to_string)
    }

    fn auth(&self) -> MutexGuard<'_, Auth> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `api_host + path` with the `client` parameter appended unless present
    pub fn full_url(&self, path: &str) -> String {
        let mut url = format!("{}{}", self.api_host, path);
        if !url.contains("?client=") && !url.contains("&client=") {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("client=");
            url.push_str(&quote_plus(&self.client_name));
        }
        url
    }

    /// Send a request and parse the JSON response
    ///
    /// # Returns
    /// `None` for an empty 2xx body, the parsed JSON otherwise.
    ///
    /// # Errors
    /// - [`ApiError::InvalidRequest`] for local validation failures, nothing sent
    /// - [`ApiError::RateLimited`] while limited, or on a 429
    /// - the HTTP error kinds once retries are exhausted or on a 4xx
    pub async fn request(&self, path: &str, options: RequestOptions) -> ApiResult<Option<Value>> {
        let response = self.request_raw(path, options).await?;
        parse_body(&response)
    }

    /// Send a request and return the raw 2xx response
    ///
    /// Used where response headers carry pagination (`link`) or the body is
    /// not JSON.
    pub async fn request_raw(&self, path: &str, options: RequestOptions) -> ApiResult<HttpResponse> {
        let request = self.prepare(path, options)?;
        let sent_token = self.auth_token();
        match self.execute(&request).await {
            Err(ApiError::Unauthorized(details)) => {
                if self.refresh_auth_token(&request.path, sent_token.as_deref()).await {
                    self.execute(&request).await
                } else {
                    Err(ApiError::Unauthorized(details))
                }
            }
            result => result,
        }
    }

    /// GET and parse
    pub async fn get(&self, path: &str) -> ApiResult<Option<Value>> {
        self.request(path, RequestOptions::get()).await
    }

    /// GET and deserialize a non-empty response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let value = self
            .get(path)
            .await?
            .ok_or_else(|| ApiError::Parse(format!("empty response from {path}")))?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Parse(format!("unexpected response from {path}: {e}")))
    }

    /// POST a JSON body
    pub async fn post(&self, path: &str, body: Value) -> ApiResult<Option<Value>> {
        self.request(path, RequestOptions::post(body)).await
    }

    /// PUT a JSON body
    pub async fn put(&self, path: &str, body: Value) -> ApiResult<Option<Value>> {
        self.request(path, RequestOptions::put(body)).await
    }

    /// DELETE
    pub async fn delete(&self, path: &str) -> ApiResult<Option<Value>> {
        self.request(path, RequestOptions::delete()).await
    }

    fn prepare(&self, path: &str, options: RequestOptions) -> ApiResult<PreparedRequest> {
        if self.auth().auth_token().is_none() {
            return Err(ApiError::InvalidRequest(
                "authorization token required".to_string(),
            ));
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        if !path.starts_with(API_PREFIX) {
            return Err(ApiError::InvalidRequest(format!(
                "invalid endpoint {path}: must start with {API_PREFIX}"
            )));
        }

        let max_attempts = options.max_attempts.unwrap_or(self.max_attempts);
        if !(MIN_ATTEMPTS..=MAX_ATTEMPTS).contains(&max_attempts) {
            return Err(ApiError::InvalidRequest(format!(
                "invalid max attempts {max_attempts}: must be within {MIN_ATTEMPTS}..={MAX_ATTEMPTS}"
            )));
        }

        let method = options.method.unwrap_or_else(|| {
            if options.body.is_some() {
                Method::POST
            } else {
                Method::GET
            }
        });
        if method == Method::GET && options.body.is_some() {
            return Err(ApiError::InvalidRequest(
                "a body is not allowed on GET requests".to_string(),
            ));
        }

        Ok(PreparedRequest {
            url: self.full_url(&path),
            path,
            method,
            body: options.body,
            timeout: options.timeout.unwrap_or(self.timeout),
            max_attempts,
        })
    }

    fn headers(&self, has_body: bool) -> ApiResult<HeaderMap> {
        let token = self.auth_token().ok_or_else(|| {
            ApiError::InvalidRequest("authorization token required".to_string())
        })?;
        let mut value = HeaderValue::from_str(&token).map_err(|_| {
            ApiError::InvalidRequest("authorization token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }

    async fn execute(&self, request: &PreparedRequest) -> ApiResult<HttpResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            if self.rate_limiter.is_rate_limited() {
                debug!(
                    path = %request.path,
                    attempt,
                    "Client is rate limited, request not sent"
                );
                return Err(ApiError::rate_limited_locally());
            }

            let http_request = HttpRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers: self.headers(request.body.is_some())?,
                body: request.body.clone(),
                timeout: request.timeout,
            };

            debug!(
                method = %request.method,
                path = %request.path,
                attempt,
                max_attempts = request.max_attempts,
                "Sending request"
            );
            let metrics = RequestMetrics::start(&request.path, attempt);

            let failure = match self.transport.send(http_request).await {
                Ok(response) => {
                    metrics.record_status(response.status.as_u16());
                    self.rate_limiter.update(&response.headers);
                    if response.is_success() {
                        return Ok(response);
                    }
                    AttemptFailure::Status(response)
                }
                Err(err) => {
                    metrics.record_transport_error();
                    AttemptFailure::Transport(err)
                }
            };

            let (status, transport_error) = match &failure {
                AttemptFailure::Status(response) => (Some(response.status), None),
                AttemptFailure::Transport(err) => (None, Some(err)),
            };
            let client_error = status.is_some_and(|s| s.is_client_error());
            let backoff = backoff_delay(attempt);
            let context = RetryContext::new(
                attempt,
                request.max_attempts,
                extract_error_type(status, transport_error),
                backoff,
                request.path.as_str(),
                failure.message(),
            );

            if client_error {
                debug!(path = %request.path, error = %context.error_message, "Request rejected");
                return Err(self.classify(failure));
            }
            if attempt >= request.max_attempts {
                warn!("{}", context.format_failure());
                return Err(self.classify(failure));
            }

            warn!("{}", context.format_retry());
            metrics::record_retry(attempt, backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    fn classify(&self, failure: AttemptFailure) -> ApiError {
        match failure {
            AttemptFailure::Transport(err) => ApiError::Connection(err),
            AttemptFailure::Status(response) => {
                let error = ApiError::from_response(&response);
                if matches!(error, ApiError::RateLimited(_)) && !self.rate_limiter.is_rate_limited() {
                    warn!(
                        cool_down_secs = RATE_LIMIT_COOL_DOWN.as_secs(),
                        "Too many requests, pausing the client"
                    );
                    self.rate_limiter.force_limited(RATE_LIMIT_COOL_DOWN);
                }
                error
            }
        }
    }

    /// Try to replace a rejected access token
    ///
    /// Returns `true` when a new token is stored and the request is worth
    /// re-issuing. `rejected` is the token the request was sent with; when
    /// another task already replaced it, the request is re-issued without a
    /// second refresh.
    async fn refresh_auth_token(&self, path: &str, rejected: Option<&str>) -> bool {
        if path.starts_with(AUTH_PREFIX) {
            return false;
        }

        let _guard = self.refresh_lock.lock().await;

        if self.auth_token().as_deref() != rejected {
            debug!("Access token already replaced by a concurrent refresh");
            return true;
        }

        let body = {
            let auth = self.auth();
            let Some(refresh_token) = auth.refresh_token() else {
                debug!("Access token rejected and no refresh token available");
                return false;
            };
            json!({
                "refresh_token": refresh_token,
                "grant_type": "refresh_token",
                "client_id": auth.client_id,
                "client_secret": auth.client_secret,
            })
        };

        {
            let mut last = self
                .last_refresh_attempt
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(at) = *last {
                if at.elapsed() <= TOKEN_REFRESH_INTERVAL {
                    debug!("Token refresh already attempted within the last 24h");
                    return false;
                }
            }
            *last = Some(Instant::now());
        }

        info!("Access token rejected, refreshing");
        match self.fetch_access_token(body).await {
            Ok(token) => {
                let token_path = self.auth().replace_auth_token(token.clone());
                if let Some(path) = token_path {
                    if let Err(e) = persist_auth_token(&path, &token).await {
                        warn!(error = %e, "Refreshed access token could not be persisted");
                    }
                }
                metrics::record_token_refresh(true);
                info!("Access token refreshed");
                true
            }
            Err(e) => {
                metrics::record_token_refresh(false);
                info!(error = %e, "Error refreshing access token");
                false
            }
        }
    }

    async fn fetch_access_token(&self, body: Value) -> ApiResult<String> {
        let request = self.prepare(AUTH_TOKEN_PATH, RequestOptions::post(body))?;
        let response = self.execute(&request).await?;
        parse_body(&response)?
            .as_ref()
            .and_then(|v| v.get("access_token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Parse("token response has no access_token".to_string()))
    }
}

/// `application/x-www-form-urlencoded` encoding of one query value
pub fn quote_plus(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn parse_body(response: &HttpResponse) -> ApiResult<Option<Value>> {
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ApiError::Parse(format!("invalid JSON response: {e}")))
}
