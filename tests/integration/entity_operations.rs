//! Integration tests for tagging, untagging and annotations

use feedly_client::data::{
    EnterpriseTag, Streamable, TagOps, UserCategory, UserTag, DEFAULT_IGNORED_STATUSES,
};
use feedly_client::identifier::StreamId;
use feedly_client::session::ApiError;
use feedly_client::stream::StreamOptions;
use reqwest::Method;
use serde_json::json;

use crate::support::{shared_session, ScriptedTransport};

fn entry_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("e{i}")).collect()
}

#[tokio::test]
async fn test_tag_entries_in_batches_ignoring_conflicts() {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    transport.push_json(409, json!({"errorMessage": "already tagged"}));
    transport.push_status(200);
    let session = shared_session(&transport);
    let tag = UserTag::from_stream_id(StreamId::parse("user/abc/tag/x").unwrap(), session);

    tag.tag_entries(&entry_ids(120), DEFAULT_IGNORED_STATUSES)
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    let sizes: Vec<usize> = requests
        .iter()
        .map(|r| r.body.as_ref().unwrap()["entryIds"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert!(requests.iter().all(|r| r.method == Method::PUT));
    assert!(transport.paths()[0].starts_with("/v3/tags/user%2Fabc%2Ftag%2Fx?"));
}

#[tokio::test]
async fn test_tag_entries_stops_on_other_errors() {
    let transport = ScriptedTransport::new();
    transport.push_status(403);
    let session = shared_session(&transport);
    let tag = UserTag::from_stream_id(StreamId::parse("user/abc/tag/x").unwrap(), session);

    let err = tag.tag_entries(&entry_ids(60), DEFAULT_IGNORED_STATUSES).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_tag_single_entry() {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    let session = shared_session(&transport);
    let tag = UserTag::from_stream_id(StreamId::parse("user/abc/tag/x").unwrap(), session);

    tag.tag_entry("e1").await.unwrap();
    assert_eq!(transport.requests()[0].body, Some(json!({"entryId": "e1"})));
}

#[tokio::test]
async fn test_untag_all_deletes_in_batches() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"ids": entry_ids(60)}));
    transport.push_status(200);
    transport.push_status(200);
    let session = shared_session(&transport);
    let tag = EnterpriseTag::from_stream_id(
        StreamId::parse("enterprise/acme/tag/0f8d2a3c-1111-2222-3333-444455556666").unwrap(),
        session,
    );

    assert_eq!(tag.untag_all(StreamOptions::default()).await.unwrap(), 60);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, Method::DELETE);
    let paths = transport.paths();
    assert!(paths[1].starts_with("/v3/tags/enterprise%2Facme%2Ftag%2F0f8d2a3c-1111-2222-3333-444455556666/e0,e1,"));
    assert!(paths[2].contains("/e50,e51,"));
}

#[tokio::test]
async fn test_delete_tags_groups_by_tag() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({"items": [
            {"id": "e1", "tags": [
                {"id": "user/abc/tag/a", "label": "A"},
                {"id": "user/other/tag/z", "label": "Z"}
            ]},
            {"id": "e2", "tags": [
                {"id": "user/abc/tag/a", "label": "A"},
                {"id": "enterprise/acme/tag/u", "label": "U", "addedBy": "abc"}
            ]},
            {"id": "e3", "tags": [{"id": "user/abc/tag/global.saved", "label": ""}]}
        ]}),
    );
    transport.push_status(200);
    transport.push_status(200);
    let session = shared_session(&transport);
    let mut user = session.user();
    let category = UserCategory::from_stream_id(
        StreamId::parse("user/abc/category/global.all").unwrap(),
        session.clone(),
    );

    let removed = user.delete_tags(&category, StreamOptions::default()).await.unwrap();

    assert_eq!(removed, 3);
    let paths = transport.paths();
    assert_eq!(paths.len(), 3);
    assert!(paths[1].starts_with("/v3/tags/enterprise%2Facme%2Ftag%2Fu/e2?"));
    assert!(paths[2].starts_with("/v3/tags/user%2Fabc%2Ftag%2Fa/e1,e2?"));
}

#[tokio::test]
async fn test_delete_own_annotations_only() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({"items": [{"id": "e1", "annotations": [
            {"id": "n1", "author": "abc"},
            {"id": "n2", "author": "someone-else"}
        ]}]}),
    );
    transport.push_status(200);
    let session = shared_session(&transport);
    let mut user = session.user();
    let tag = UserTag::from_stream_id(StreamId::parse("user/abc/tag/x").unwrap(), session.clone());

    assert_eq!(user.delete_annotations(&tag, StreamOptions::default()).await.unwrap(), 1);
    assert!(transport.paths()[1].starts_with("/v3/annotations/n1?"));
}

#[tokio::test]
async fn test_annotate_entry() {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    let session = shared_session(&transport);
    let user = session.user();

    user.annotate_entry("e1", "look at this", &[], &["a@b.c".to_string()])
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(
        request.body,
        Some(json!({
            "comment": "look at this",
            "entryId": "e1",
            "emailMentions": ["a@b.c"],
            "slackMentions": []
        }))
    );
}

#[tokio::test]
async fn test_create_enterprise_tag() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!([{"id": "enterprise/acme/tag/11111111-2222-3333-4444-555555555555", "label": "Hunt"}]),
    );
    let session = shared_session(&transport);
    let mut user = session.user();

    let tag = user
        .create_enterprise_tag(json!({"label": "Hunt", "emailSettings": {"includeFollowers": true}}))
        .await
        .unwrap();

    assert_eq!(tag.label(), "Hunt");
    assert_eq!(tag.id(), "enterprise/acme/tag/11111111-2222-3333-4444-555555555555");
}

#[tokio::test]
async fn test_create_enterprise_tag_requires_followers_in_email_settings() {
    let transport = ScriptedTransport::new();
    let session = shared_session(&transport);
    let mut user = session.user();

    let err = user
        .create_enterprise_tag(json!({"label": "Hunt", "emailSettings": {}}))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_archive_and_delete_team_tag() {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    transport.push_status(200);
    let session = shared_session(&transport);
    let tag = EnterpriseTag::from_stream_id(StreamId::parse("enterprise/acme/tag/u").unwrap(), session);

    tag.archive().await.unwrap();
    tag.delete().await.unwrap();

    let paths = transport.paths();
    assert!(paths[0].starts_with("/v3/enterprise/tags/enterprise%2Facme%2Ftag%2Fu?client="));
    assert!(paths[1].starts_with("/v3/enterprise/tags/enterprise%2Facme%2Ftag%2Fu?deleteContent=true&client="));
}
