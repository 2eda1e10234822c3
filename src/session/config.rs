//! Session configuration constants

use std::time::Duration;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://cloud.feedly.com";

/// Every endpoint lives under this versioned prefix.
pub const API_PREFIX: &str = "/v3/";

/// Auth endpoints never trigger a token refresh themselves.
pub const AUTH_PREFIX: &str = "/v3/auth";

/// Token refresh endpoint.
pub const AUTH_TOKEN_PATH: &str = "/v3/auth/token";

/// Default value of the `client` query parameter appended to every request.
pub const DEFAULT_CLIENT_NAME: &str = "feedly.rust.client";

/// Client id/secret that work for developer tokens.
pub const DEFAULT_CLIENT_ID: &str = "feedlydev";
/// See [`DEFAULT_CLIENT_ID`].
pub const DEFAULT_CLIENT_SECRET: &str = "feedlydev";

/// Per-request timeout. Not a deadline across retries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP connect timeout of the shared HTTP client.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of attempts per request (initial try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Smallest accepted attempt count.
pub const MIN_ATTEMPTS: u32 = 1;

/// Largest accepted attempt count.
pub const MAX_ATTEMPTS: u32 = 10;

/// Minimum spacing between two token refresh attempts.
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cool-down applied after a 429 response without usable rate limit headers.
pub const RATE_LIMIT_COOL_DOWN: Duration = Duration::from_secs(60);

/// Backoff before the next attempt: `2^(attempt-1)` seconds (1s, 2s, 4s, ...).
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_ATTEMPTS);
    Duration::from_secs(2u64.saturating_pow(exponent))
}
