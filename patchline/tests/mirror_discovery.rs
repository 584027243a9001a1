//! Discovery against a live server, then serving versions from the saved
//! descriptor.

mod common;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use patchline::aggregator::{ResolveError, SourceAggregator};
use patchline::discovery::{DiscoveryError, MirrorProber, Strategy};
use patchline::model::Platform;
use patchline::source::VersionSource;
use patchline::store::DescriptorStore;

fn host_base(headers: &HeaderMap) -> String {
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

async fn vendor_info(headers: HeaderMap) -> Json<Value> {
    let base = host_base(&headers);
    Json(json!({
        "linux-amd64": {
            "release": {
                "newest": 7,
                "url": format!("{}/release/linux/amd64/v7-linux-amd64.pwr", base)
            },
            "pre-release": { "newest": 9, "patches": [8] }
        },
        "windows-amd64": {
            "release": { "newest": 6 }
        }
    }))
}

async fn listing() -> Html<&'static str> {
    Html(r#"<html><body><a href="v5-linux-amd64.pwr">v5</a></body></html>"#)
}

fn mirror_app() -> Router {
    Router::new()
        .route("/info", get(vendor_info))
        .route("/", get(listing))
}

#[tokio::test]
async fn test_discovered_mirror_serves_versions() {
    let (base, _server) = common::start_server(mirror_app()).await;
    let http = common::http();
    let cancel = CancellationToken::new();

    let report = MirrorProber::new(http.clone())
        .discover(&base, &cancel)
        .await
        .unwrap();
    assert_eq!(report.strategy, Strategy::VendorInfo);
    assert_eq!(report.candidate, base);
    assert_eq!(report.probe_url, format!("{}/info", base));
    assert!(report.descriptor.is_diff_based_branch("pre-release"));
    assert!(!report.descriptor.is_diff_based_branch("release"));

    let dir = TempDir::new().unwrap();
    let store = DescriptorStore::new(dir.path().join("mirrors"));
    store.ensure_defaults().unwrap();
    store.save(&report.descriptor).unwrap();
    assert_eq!(store.list_ids().unwrap(), vec![report.descriptor.id.clone()]);

    let platform = Platform::new("linux", "amd64");
    let sources: Vec<Arc<dyn VersionSource>> = store
        .load_mirrors(http, &platform)
        .unwrap()
        .into_iter()
        .map(|mirror| Arc::new(mirror) as Arc<dyn VersionSource>)
        .collect();
    let aggregator = SourceAggregator::new(platform).with_sources(sources);

    let versions = aggregator.get_versions("release", false, &cancel).await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 7);

    let expected = format!("{}/release/linux/amd64/v7-linux-amd64.pwr", base);
    let url = aggregator
        .resolve_download_url("release", 7, &cancel)
        .await
        .unwrap();
    assert_eq!(url, expected);

    let missing = aggregator.resolve_download_url("release", 8, &cancel).await;
    assert!(matches!(missing, Err(ResolveError::NoSourceAvailable { .. })));
}

#[tokio::test]
async fn test_disabled_mirror_is_skipped() {
    let (base, _server) = common::start_server(mirror_app()).await;
    let http = common::http();
    let cancel = CancellationToken::new();

    let report = MirrorProber::new(http.clone())
        .discover(&base, &cancel)
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let store = DescriptorStore::new(dir.path());
    store.save(&report.descriptor).unwrap();
    store.set_enabled(&report.descriptor.id, false).unwrap();

    let platform = Platform::new("linux", "amd64");
    let aggregator = SourceAggregator::new(platform.clone()).with_sources(
        store
            .load_mirrors(http, &platform)
            .unwrap()
            .into_iter()
            .map(|mirror| Arc::new(mirror) as Arc<dyn VersionSource>),
    );

    assert!(aggregator.get_versions("release", false, &cancel).await.is_empty());
}

#[tokio::test]
async fn test_unrecognized_server_exhausts_every_strategy() {
    let (base, _server) = common::start_server(Router::new()).await;
    let cancel = CancellationToken::new();

    let err = MirrorProber::new(common::http())
        .discover(&base, &cancel)
        .await
        .unwrap_err();

    let DiscoveryError::Exhausted { url, attempts } = err else {
        panic!("expected exhaustion, got {:?}", err);
    };
    assert_eq!(url, base);
    assert_eq!(attempts.len(), Strategy::ORDER.len());
    assert!(attempts.iter().all(|a| a.candidate == base));
}
