//! Authenticated request execution against the Feedly API

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod retry_formatter;
pub mod transport;

pub use auth::{default_token_dir, persist_auth_token, setup_auth, Auth, AuthError};
pub use client::{quote_plus, FeedlySession, RequestOptions, SharedSession};
pub use error::{ApiError, ApiErrorDetails, ApiResult};
pub use rate_limit::{RateLimitState, RateLimiter};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
