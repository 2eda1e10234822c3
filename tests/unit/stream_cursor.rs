//! Unit tests for stream cursor paging

use feedly_client::data::{Streamable, UserCategory};
use feedly_client::identifier::StreamId;
use feedly_client::session::{ApiError, SharedSession};
use feedly_client::stream::{Continuation, IdStream, StreamCursor, StreamOptions};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

use crate::support::{shared_session, ScriptedTransport};

fn ids_cursor(session: SharedSession, options: StreamOptions) -> IdStream {
    let stream_id = StreamId::parse("user/abc/category/tech").unwrap();
    StreamCursor::new(session, stream_id, options)
}

fn page(ids: &[&str], continuation: Option<&str>) -> serde_json::Value {
    match continuation {
        Some(c) => json!({"ids": ids, "continuation": c}),
        None => json!({"ids": ids}),
    }
}

fn setup() -> (Arc<ScriptedTransport>, SharedSession) {
    let transport = ScriptedTransport::new();
    let session = shared_session(&transport);
    (transport, session)
}

#[tokio::test]
async fn test_stops_exactly_at_max_count() {
    let (transport, session) = setup();
    transport.push_json(200, page(&["a", "b", "c"], Some("p2")));
    transport.push_json(200, page(&["d", "e", "f"], Some("p3")));
    transport.push_json(200, page(&["g"], None));

    let mut cursor = ids_cursor(session, StreamOptions::default().with_max_count(5).with_count(3));
    let ids = cursor.collect_all().await.unwrap();

    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(cursor.pages_fetched(), 2, "no page beyond what max_count needs");
    assert_eq!(transport.request_count(), 2);
    assert!(transport.paths()[1].contains("&continuation=p2"));
}

#[tokio::test]
async fn test_single_page_when_it_covers_max_count() {
    let (transport, session) = setup();
    let ids: Vec<String> = (0..20).map(|i| format!("e{i}")).collect();
    transport.push_json(200, json!({"ids": ids, "continuation": "more"}));

    let mut cursor = ids_cursor(session, StreamOptions::default().with_max_count(3));
    assert_eq!(cursor.collect_all().await.unwrap().len(), 3);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_stream_shorter_than_max_count() {
    let (transport, session) = setup();
    transport.push_json(200, page(&["a", "b"], Some("p2")));
    transport.push_json(200, page(&["c"], None));

    let mut cursor = ids_cursor(session, StreamOptions::default().with_max_count(100));
    assert_eq!(cursor.collect_all().await.unwrap(), vec!["a", "b", "c"]);
    assert_eq!(cursor.continuation(), &Continuation::Exhausted);
    assert_eq!(cursor.next().await.unwrap(), None);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_empty_page_with_continuation_is_skipped() {
    let (transport, session) = setup();
    transport.push_json(200, page(&[], Some("p2")));
    transport.push_json(200, page(&["a"], None));

    let mut cursor = ids_cursor(session, StreamOptions::default());
    assert_eq!(cursor.next().await.unwrap().as_deref(), Some("a"));
    assert_eq!(cursor.pages_fetched(), 2);
}

#[tokio::test]
async fn test_missing_items_property_ends_traversal() {
    let (transport, session) = setup();
    transport.push_json(200, json!({"id": "user/abc/category/tech"}));

    let mut cursor = ids_cursor(session, StreamOptions::default());
    assert_eq!(cursor.next().await.unwrap(), None);
    assert_eq!(cursor.continuation(), &Continuation::Exhausted);
}

#[tokio::test]
async fn test_reset_replays_from_first_page() {
    let (transport, session) = setup();
    transport.push_json(200, page(&["a", "b"], Some("p2")));
    transport.push_json(200, page(&["a", "b"], Some("p2")));

    let mut cursor = ids_cursor(session, StreamOptions::default().with_max_count(2));
    let first = cursor.collect_all().await.unwrap();
    cursor.reset();
    let second = cursor.collect_all().await.unwrap();

    assert_eq!(first, second);
    let paths = transport.paths();
    assert_eq!(paths[0], paths[1]);
    assert!(!paths[1].contains("continuation="));
}

#[tokio::test]
async fn test_failed_page_can_be_retried() {
    let (transport, session) = setup();
    transport.push_status(400);
    transport.push_json(200, page(&["a"], None));

    let mut cursor = ids_cursor(session, StreamOptions::default());
    assert!(matches!(cursor.next().await, Err(ApiError::BadRequest(_))));
    assert_eq!(cursor.next().await.unwrap().as_deref(), Some("a"));

    let paths = transport.paths();
    assert_eq!(paths[0], paths[1]);
}

#[tokio::test]
async fn test_contents_yield_entries() {
    let (transport, session) = setup();
    transport.push_json(
        200,
        json!({"items": [{"id": "e1", "title": "First"}, {"id": "e2", "title": "Second"}]}),
    );

    let category = UserCategory::from_stream_id(
        StreamId::parse("user/abc/category/tech").unwrap(),
        session,
    );
    let entries: Vec<_> = category
        .stream_contents(StreamOptions::default())
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    let titles: Vec<_> = entries.iter().filter_map(|e| e.title()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    assert!(transport.paths()[0].starts_with("/v3/streams/contents?streamId=user%2Fabc%2Fcategory%2Ftech"));
}

#[tokio::test]
async fn test_query_carries_options() {
    let (transport, session) = setup();
    transport.push_json(200, page(&[], None));

    let options = StreamOptions::default()
        .with_count(50)
        .with_unread_only(true)
        .with_newer_than(1_700_000_000_000)
        .with_continuation("start");
    ids_cursor(session, options).collect_all().await.unwrap();

    let path = &transport.paths()[0];
    assert!(path.contains("count=50"));
    assert!(path.contains("unreadOnly=true"));
    assert!(path.contains("newerThan=1700000000000"));
    assert!(path.contains("continuation=start"));
    assert!(path.ends_with("client=feedly.rust.client"));
}
