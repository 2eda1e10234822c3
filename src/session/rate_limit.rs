//! Rate limit tracking from response headers
//!
//! The service advertises its quota with three headers on every response:
//! current request count, limit, and seconds until the window resets.
//! A client is rate limited while `count >= limit` and the reset time lies ahead.

use reqwest::header::HeaderMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Header carrying the number of requests made in the current window
pub const COUNT_HEADER: &str = "x-ratelimit-count";
/// Header carrying the number of requests allowed per window
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the seconds until the window resets
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Snapshot of the advertised quota
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Requests made in the current window
    pub count: Option<u64>,
    /// Requests allowed per window
    pub limit: Option<u64>,
    /// When the window resets
    pub until: Option<Instant>,
    /// End of a cool-down forced after a 429; header updates leave it alone
    pub forced_until: Option<Instant>,
}

impl RateLimitState {
    /// Whether the quota is exhausted at `now`
    pub fn is_limited_at(&self, now: Instant) -> bool {
        if self.forced_until.is_some_and(|until| now < until) {
            return true;
        }
        match (self.count, self.limit, self.until) {
            (Some(count), Some(limit), Some(until)) => count >= limit && now < until,
            _ => false,
        }
    }
}

/// Tracks the quota of one session
///
/// Updated after every response; shared state is behind a mutex so a session
/// can be used from several tasks.
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    /// Create a limiter with no known quota
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update the quota from response headers
    ///
    /// Each header present with a positive value overwrites the stored value;
    /// a reset header moves the reset time to `now + reset` seconds.
    ///
    /// # Returns
    /// `Some(count <= limit)` when both count and limit were in this response,
    /// `None` otherwise. Informational only.
    pub fn update(&self, headers: &HeaderMap) -> Option<bool> {
        let count = parse_header(headers, COUNT_HEADER);
        let limit = parse_header(headers, LIMIT_HEADER);
        let reset = parse_header(headers, RESET_HEADER);

        let mut state = self.state();
        if let Some(count) = count {
            state.count = Some(count);
        }
        if let Some(limit) = limit {
            state.limit = Some(limit);
        }
        if let Some(reset) = reset {
            state.until = Some(Instant::now() + Duration::from_secs(reset));
        }

        match (count, limit) {
            (Some(count), Some(limit)) => {
                debug!(count, limit, "Rate limit usage updated");
                Some(count <= limit)
            }
            _ => None,
        }
    }

    /// Whether requests should currently be refused
    pub fn is_rate_limited(&self) -> bool {
        self.state().is_limited_at(Instant::now())
    }

    /// Force the limited condition for `cool_down`
    ///
    /// Used after a 429 response. The client stays limited until the
    /// cool-down expires, whatever later responses advertise.
    pub fn force_limited(&self, cool_down: Duration) {
        let until = Instant::now() + cool_down;
        let mut state = self.state();
        state.count = Some(1);
        state.limit = Some(1);
        state.until = Some(until);
        state.forced_until = Some(until);
    }

    /// Reset time of the current window or forced cool-down, whichever is later
    pub fn limited_until(&self) -> Option<Instant> {
        let state = self.state();
        state.until.max(state.forced_until)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> RateLimitState {
        *self.state()
    }
}

fn parse_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|value| *value > 0)
}
