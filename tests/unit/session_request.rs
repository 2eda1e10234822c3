//! Unit tests for request execution: validation, retries and classification

use feedly_client::session::{ApiError, Auth, FeedlySession, RequestOptions, TransportError};
use reqwest::Method;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

use crate::support::{session, session_with_auth, ScriptedTransport, API_HOST};

#[tokio::test(start_paused = true)]
async fn test_server_errors_are_retried_with_backoff() {
    let transport = ScriptedTransport::new();
    transport.push_status(500);
    transport.push_status(500);
    transport.push_json(200, json!({"id": "abc"}));
    let session = session(&transport);

    let started = Instant::now();
    let profile = session.get("/v3/profile").await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(profile, Some(json!({"id": "abc"})));
    assert_eq!(transport.request_count(), 3);
    // 1s after the first failure, 2s after the second
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_server_error_after_last_attempt() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push_status(500);
    }
    let session = session(&transport);

    let err = session.get("/v3/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError(_)), "{err}");
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_retried() {
    let transport = ScriptedTransport::new();
    transport.push_error(TransportError::Timeout("slow".into()));
    transport.push_json(200, json!({"ok": true}));
    let session = session(&transport);

    assert_eq!(session.get("/v3/profile").await.unwrap(), Some(json!({"ok": true})));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connection_error_after_budget() {
    let transport = ScriptedTransport::new();
    let session = session(&transport).with_max_attempts(2);

    let err = session.get("/v3/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::Connection(_)), "{err}");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        400,
        json!({"errorCode": 400, "errorId": "id-1", "errorMessage": "bad stream"}),
    );
    let session = session(&transport);

    let err = session.get("/v3/streams/contents").await.unwrap_err();
    let ApiError::BadRequest(details) = &err else {
        panic!("expected bad request, got {err}");
    };
    assert_eq!(details.error_id.as_deref(), Some("id-1"));
    assert_eq!(details.error_message.as_deref(), Some("bad stream"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_not_found_is_terminal_http_error() {
    let transport = ScriptedTransport::new();
    transport.push_status(404);
    let session = session(&transport);

    let err = session.get("/v3/tags").await.unwrap_err();
    assert!(matches!(err, ApiError::Http(_)));
    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_429_pauses_the_client() {
    let transport = ScriptedTransport::new();
    transport.push_status(429);
    let session = session(&transport);

    let err = session.get("/v3/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(_)));
    assert!(session.rate_limiter().is_rate_limited());

    let err = session.get("/v3/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(_)));
    assert_eq!(transport.request_count(), 1, "second call must not reach the network");
}

#[tokio::test]
async fn test_rate_limit_headers_block_next_request() {
    let transport = ScriptedTransport::new();
    transport.push(
        feedly_client::session::HttpResponse::new(reqwest::StatusCode::OK, "{}")
            .with_header("X-RateLimit-Count", "10")
            .with_header("X-RateLimit-Limit", "10")
            .with_header("X-RateLimit-Reset", "60"),
    );
    let session = session(&transport);

    session.get("/v3/profile").await.unwrap();
    let err = session.get("/v3/profile").await.unwrap_err();

    assert!(matches!(err, ApiError::RateLimited(_)));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_get_with_body_rejected() {
    let transport = ScriptedTransport::new();
    let session = session(&transport);

    let options = RequestOptions::get().with_body(json!({"a": 1}));
    let err = session.request("/v3/profile", options).await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_max_attempts_bounds() {
    let transport = ScriptedTransport::new();
    let session = session(&transport);

    for attempts in [0, 11] {
        let options = RequestOptions::get().with_max_attempts(attempts);
        let err = session.request("/v3/profile", options).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "{attempts}: {err}");
    }
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_path_validation() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({}));
    let session = session(&transport);

    session.get("v3/profile").await.unwrap();
    assert_eq!(
        transport.requests()[0].url,
        format!("{API_HOST}/v3/profile?client=feedly.rust.client")
    );

    let err = session.get("/v2/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_missing_token_rejected_locally() {
    let transport = ScriptedTransport::new();
    let session = session_with_auth(&transport, Auth::new(""));

    let err = session.get("/v3/profile").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_headers_and_method() {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    transport.push_status(200);
    let session = session(&transport);

    assert_eq!(session.put("/v3/tags/x", json!({"entryId": "e"})).await.unwrap(), None);
    session.delete("/v3/tags/x/e").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[0].header("authorization"), Some("token"));
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[0].body, Some(json!({"entryId": "e"})));
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].header("content-type"), None);
}

#[tokio::test]
async fn test_invalid_json_is_parse_error() {
    let transport = ScriptedTransport::new();
    transport.push(feedly_client::session::HttpResponse::new(
        reqwest::StatusCode::OK,
        "not json",
    ));
    let session = session(&transport);

    assert!(matches!(
        session.get("/v3/profile").await,
        Err(ApiError::Parse(_))
    ));
}

#[test]
fn test_client_name_required() {
    assert!(FeedlySession::with_token("t").with_client_name("  ").is_err());
}
