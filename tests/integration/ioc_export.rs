//! Integration tests for the enterprise IoC export

use chrono::{TimeZone, Utc};
use feedly_client::enterprise::{IocDownloader, IocDownloaderBuilder, IocExport, IocFormat};
use feedly_client::session::HttpResponse;
use reqwest::StatusCode;
use serde_json::json;

use crate::support::{shared_session, ScriptedTransport};

const STREAM: &str = "enterprise/acme/category/global.all";

fn with_next(response: HttpResponse, continuation: &str) -> HttpResponse {
    let link = format!(
        "<https://api.test/v3/enterprise/ioc?streamId=x&continuation={continuation}>; rel=\"next\""
    );
    response.with_header("link", &link)
}

#[tokio::test]
async fn test_stix_pages_are_merged_into_one_bundle() {
    let transport = ScriptedTransport::new();
    transport.push(with_next(
        HttpResponse::json(StatusCode::OK, &json!({"type": "bundle", "objects": [{"id": "a"}]})),
        "page2",
    ));
    transport.push_json(200, json!({"type": "bundle", "objects": [{"id": "b"}, {"id": "c"}]}));
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Stix, Some(since), STREAM);

    let export = downloader.download_all().await.unwrap();

    let IocExport::Stix(bundle) = &export else {
        panic!("expected STIX");
    };
    assert_eq!(export.len(), 3);
    assert_eq!(bundle["type"], "bundle");
    let paths = transport.paths();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].contains("format=stix2.1"));
    assert!(paths[0].contains("newerThan=1704067200"));
    assert!(!paths[0].contains("continuation="));
    assert!(paths[1].contains("&continuation=page2"));
}

#[tokio::test]
async fn test_misp_without_newer_than_follows_links() {
    let transport = ScriptedTransport::new();
    transport.push(with_next(
        HttpResponse::json(StatusCode::OK, &json!({"response": [{"Event": {"id": 1}}]})),
        "p2",
    ));
    transport.push_json(200, json!({"response": [{"Event": {"id": 2}}]}));
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Misp, None, STREAM);

    let export = downloader.download_all().await.unwrap();

    assert_eq!(export, IocExport::Misp(json!({"response": [{"Event": {"id": 1}}, {"Event": {"id": 2}}]})));
    assert!(!transport.paths()[0].contains("newerThan"));
}

#[tokio::test]
async fn test_csv_pages_are_concatenated() {
    let transport = ScriptedTransport::new();
    transport.push(with_next(
        HttpResponse::new(StatusCode::OK, "type,value\nip,1.2.3.4\n"),
        "p2",
    ));
    transport.push(HttpResponse::new(StatusCode::OK, "type,value\ndomain,evil.com\n"));
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Csv, None, STREAM);

    let IocExport::Csv(table) = downloader.download_all().await.unwrap() else {
        panic!("expected CSV");
    };
    assert_eq!(table.headers, vec!["type", "value"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.value(1, "value"), Some("evil.com"));
}

#[tokio::test]
async fn test_csv_pages_with_new_columns_keep_every_field() {
    let transport = ScriptedTransport::new();
    transport.push(with_next(
        HttpResponse::new(StatusCode::OK, "type,value\nip,1.2.3.4\n"),
        "p2",
    ));
    transport.push(HttpResponse::new(
        StatusCode::OK,
        "value,type,extra\nevil.com,domain,x\n",
    ));
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Csv, None, STREAM);

    let IocExport::Csv(table) = downloader.download_all().await.unwrap() else {
        panic!("expected CSV");
    };
    assert_eq!(table.headers, vec!["type", "value", "extra"]);
    assert_eq!(table.value(0, "extra"), Some(""));
    assert_eq!(table.value(1, "extra"), Some("x"));
    assert_eq!(table.value(1, "type"), Some("domain"));
}

#[tokio::test]
async fn test_page_limit_stops_the_export() {
    let transport = ScriptedTransport::new();
    for i in 0..5 {
        transport.push(with_next(
            HttpResponse::json(StatusCode::OK, &json!({"objects": [{"id": i}]})),
            &format!("p{}", i + 1),
        ));
    }
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Stix, None, STREAM)
        .with_max_pages(2);

    assert_eq!(downloader.download_all().await.unwrap().len(), 2);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_repeated_continuation_stops_the_export() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push(with_next(
            HttpResponse::json(StatusCode::OK, &json!({"objects": []})),
            "same",
        ));
    }
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Stix, None, STREAM);

    downloader.download_all().await.unwrap();
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_builder_resolves_all_enterprise_categories() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"id": "abc", "enterpriseName": "acme"}));
    transport.push_json(200, json!({"objects": []}));
    let mut builder = IocDownloaderBuilder::new(shared_session(&transport), IocFormat::Stix);

    let downloader = builder.from_all_enterprise_categories().await.unwrap();
    assert_eq!(downloader.stream_id(), STREAM);

    downloader.download_all().await.unwrap();
    let paths = transport.paths();
    assert!(paths[0].starts_with("/v3/profile"));
    assert!(paths[1].starts_with(
        "/v3/enterprise/ioc?streamId=enterprise%2Facme%2Fcategory%2Fglobal.all&format=stix2.1"
    ));
}

#[tokio::test]
async fn test_builder_resolves_user_category_by_label() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!([{"id": "user/abc/category/sec", "label": "Security"}]));
    let mut builder = IocDownloaderBuilder::new(shared_session(&transport), IocFormat::Csv);

    let downloader = builder.from_user_category("Security").await.unwrap();
    assert_eq!(downloader.stream_id(), "user/abc/category/sec");
    assert_eq!(downloader.format(), IocFormat::Csv);
}

#[tokio::test]
async fn test_export_errors_propagate() {
    let transport = ScriptedTransport::new();
    transport.push_status(403);
    let downloader = IocDownloader::new(shared_session(&transport), IocFormat::Stix, None, STREAM);

    assert!(downloader.download_all().await.is_err());
}
