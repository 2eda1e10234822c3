//! Unit tests for stream id parsing and building

use feedly_client::identifier::{StreamId, StreamSource};

#[test]
fn test_user_id_keeps_slashes_in_label() {
    let id = StreamId::parse("user/abc/tag/news/world").unwrap();
    assert_eq!(id.source(), StreamSource::User);
    assert_eq!(id.source_id(), "abc");
    assert_eq!(id.stream_type(), "tag");
    assert_eq!(id.content_id(), "news/world");
    assert_eq!(id.to_string(), "user/abc/tag/news/world");
}

#[test]
fn test_enterprise_id() {
    let id = StreamId::parse("enterprise/acme/category/0f8d2a3c-1111-2222-3333-444455556666").unwrap();
    assert!(id.is_enterprise_stream());
    assert!(id.is_category());
    assert_eq!(id.namespace(), "enterprise/acme/category/");
}

#[test]
fn test_unknown_source_is_kept_verbatim() {
    let id = StreamId::parse("feed/http://example.com/rss").unwrap();
    assert_eq!(id.source(), StreamSource::Unknown);
    assert_eq!(id.id(), "feed/http://example.com/rss");
}

#[test]
fn test_too_few_parts() {
    assert!(StreamId::parse("user/abc/tag").is_err());
    assert!("".parse::<StreamId>().is_err());
}

#[test]
fn test_build_and_parse_agree() {
    let built = StreamId::from_parts(StreamSource::Enterprise, "acme", "tag", "x").unwrap();
    let parsed = StreamId::parse(built.id()).unwrap();
    assert_eq!(built, parsed);
}

#[test]
fn test_user_label_with_slash_round_trips() {
    let built = StreamId::from_parts(StreamSource::User, "abc", "tag", "news/world").unwrap();
    let parsed = StreamId::parse(built.id()).unwrap();
    assert_eq!(built, parsed);
    assert_eq!(parsed.content_id(), "news/world");
}

#[test]
fn test_parts_that_would_not_parse_back_are_rejected() {
    assert!(StreamId::from_parts(StreamSource::Enterprise, "acme", "tag", "a/b").is_err());
    assert!(StreamId::from_parts(StreamSource::User, "a/b", "tag", "x").is_err());
    assert!(StreamId::from_parts(StreamSource::Enterprise, "a/b", "tag", "x").is_err());
    assert!(StreamId::from_parts(StreamSource::User, "abc", "tag/x", "y").is_err());
}

#[test]
fn test_global_all_streams() {
    assert_eq!(
        StreamId::all_user_categories("abc").unwrap().id(),
        "user/abc/category/global.all"
    );
    assert_eq!(
        StreamId::all_enterprise_categories("acme").unwrap().id(),
        "enterprise/acme/category/global.all"
    );
    assert!(StreamId::all_user_categories("").is_err());
}
