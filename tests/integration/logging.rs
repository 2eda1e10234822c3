//! Integration tests for logging and tracing

use feedly_client::session::{ApiError, RequestOptions};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::support::{session, ScriptedTransport};

#[test]
fn test_tracing_subscriber_initialization() {
    // Another test may have installed a subscriber already
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feedly_client=debug")),
        )
        .with_test_writer()
        .try_init();

    assert!(result.is_ok() || result.is_err());
}

#[test]
fn test_tracing_json_format() {
    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("feedly_client=info"))
        .with_test_writer()
        .try_init();

    assert!(result.is_ok() || result.is_err());
}

#[test]
fn test_env_filter_parsing() {
    for directive in ["info", "feedly_client=debug", "warn,feedly_client=trace"] {
        let filter = EnvFilter::try_new(directive);
        assert!(filter.is_ok(), "directive {directive} should parse");
    }
}

#[test]
fn test_structured_logging_fields() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("feedly_client=debug"))
        .with_test_writer()
        .try_init();

    let stream_id = "user/abc/category/tech";
    info!(stream_id, count = 20, "Fetched page");
    debug!(stream_id, continuation = "c1", "Following continuation");
    warn!(attempt = 2, "Retrying");
}

#[tokio::test]
async fn test_failed_requests_log_and_return_errors() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("feedly_client=debug"))
        .with_test_writer()
        .try_init();

    let transport = ScriptedTransport::new();
    transport.push_json(403, json!({"errorMessage": "forbidden"}));
    let session = session(&transport);

    let result = session
        .request("/v3/profile", RequestOptions::get())
        .await;
    let Err(ApiError::Http(details)) = result else {
        panic!("expected an HTTP error");
    };
    assert_eq!(details.status, 403);
    assert_eq!(details.error_message.as_deref(), Some("forbidden"));
}
