//! # Feedly Client Library
//!
//! An async client for the Feedly cloud REST API: authenticated requests with
//! retries, rate limiting and token refresh, paginated stream traversal,
//! name resolution for feeds and boards, and enterprise IoC export.
//!
//! ## Features
//!
//! - **Resilient requests**: exponential backoff on transient failures, a
//!   client-side rate limiter fed by `X-RateLimit-*` headers, and a one-shot
//!   token refresh on 401
//! - **Stream cursors**: lazy, bounded traversal of entries or entry ids
//! - **Name resolution**: look feeds and boards up by label, id or UUID
//! - **Enterprise**: team tags, IoC export (STIX 2.1, MISP, CSV), MISP upload
//!
//! ## Quick Start
//!
//! ```no_run
//! use feedly_client::data::Streamable;
//! use feedly_client::session::{Auth, FeedlySession};
//! use feedly_client::stream::StreamOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Auth::from_dir(feedly_client::session::default_token_dir())?;
//! let session = FeedlySession::new(auth).into_shared();
//!
//! let mut user = session.user();
//! let category = user.user_categories().await?.get("Tech").await?;
//!
//! let mut entries = category.stream_contents(StreamOptions::default().with_max_count(10));
//! while let Some(entry) = entries.next().await? {
//!     println!("{}", entry.title().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`session`] - Request execution, credentials, retries and rate limiting
//! - [`stream`] - Paginated stream cursors
//! - [`registry`] - Name and id resolution for categories and tags
//! - [`data`] - Entities (entries, categories, tags) and the user
//! - [`identifier`] - Stream id parsing (`<source>/<id>/<type>/<name>`)
//! - [`enterprise`] - IoC export and MISP upload
//! - [`output`] - File writers for exports

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Entities and the authenticated user
pub mod data;

/// Enterprise features
pub mod enterprise;

/// Stream identifier parsing
pub mod identifier;

/// Prometheus metrics
pub mod metrics;

/// File writers
pub mod output;

/// Stream name resolution
pub mod registry;

/// Authenticated session
pub mod session;

/// Graceful shutdown coordination
pub mod shutdown;

/// Stream pagination
pub mod stream;

// Re-export commonly used types
pub use data::{FeedlyUser, Streamable};
pub use identifier::{StreamId, StreamSource};
pub use session::{ApiError, ApiResult, Auth, FeedlySession, SharedSession};
pub use stream::{StreamCursor, StreamOptions};
