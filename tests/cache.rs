//! Node cache behavior seen through the HTTP surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

mod common;

async fn setup(fresh_secs: u64) -> (common::TestServer, Arc<AtomicUsize>) {
    let (remote, hits) = common::start_counting_backend(common::encode_list(&[
        "trojan://pw@r1.example.com:443#R1",
        "trojan://pw@r2.example.com:443#R2",
    ]))
    .await;
    let store = common::seeded_store(
        json!({"mytoken": "abc"}),
        json!([{"id": "r1", "url": format!("http://{}/sub", remote), "enabled": true}]),
        json!([]),
    );
    let mut config = common::test_config();
    config.cache.fresh_secs = fresh_secs;
    (common::spawn_server(config, store).await, hits)
}

async fn fetch(server: &common::TestServer, path: &str) -> (String, String) {
    let res = common::client().get(server.url(path)).send().await.unwrap();
    let status = res.headers()["x-cache-status"].to_str().unwrap().to_string();
    (status, res.text().await.unwrap())
}

#[tokio::test]
async fn test_fresh_entry_is_served_without_fetching() {
    let (server, hits) = setup(300).await;

    let (first_status, first) = fetch(&server, "/sub/abc?base64").await;
    let (second_status, second) = fetch(&server, "/sub/abc?base64").await;

    assert_eq!(first_status, "MISS");
    assert_eq!(second_status, "HIT");
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forced_refresh_always_fetches() {
    let (server, hits) = setup(300).await;

    fetch(&server, "/sub/abc?base64").await;
    let (status, _) = fetch(&server, "/sub/abc?base64&refresh").await;
    assert_eq!(status, "REFRESH");
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let (status, _) = fetch(&server, "/sub/abc?base64&nocache=1").await;
    assert_eq!(status, "REFRESH");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_stale_entry_is_served_then_refreshed() {
    let (server, hits) = setup(0).await;

    let (_, first) = fetch(&server, "/sub/abc?base64").await;
    let (status, second) = fetch(&server, "/sub/abc?base64").await;
    assert_eq!(status, "STALE");
    assert_eq!(first, second);

    let mut refreshed = false;
    for _ in 0..50 {
        if hits.load(Ordering::SeqCst) >= 2 {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshed, "background refresh never reached the source");
}
