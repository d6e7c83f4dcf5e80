//! Conversion backend failover, callback re-entry and degraded output.

use std::sync::atomic::Ordering;

use reqwest::header::CONTENT_TYPE;
use serde_json::json;

use subhub::config::SubconverterConfig;
use subhub::links::link_name;
use subhub::subconverter::{Attempt, ConversionRequest, SubconverterClient, SubconverterError};

mod common;

async fn failing_backend(status: u16) -> std::net::SocketAddr {
    common::start_programmable_backend(move |_| async move { (status, "backend down".to_string()) }).await
}

fn query_param(target: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(&format!("http://mock{}", target)).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_first_success_after_failures() {
    let first = failing_backend(503).await;
    let second = failing_backend(500).await;
    let (third, third_hits) = common::start_counting_backend("converted by third").await;
    let (fourth, fourth_hits) = common::start_counting_backend("never reached").await;

    let client = SubconverterClient::new(
        reqwest::Client::builder().no_proxy().build().unwrap(),
        &SubconverterConfig {
            timeout_secs: 2,
            deadline_secs: 10,
            fallbacks: vec![
                format!("http://{}", second),
                format!("http://{}", third),
                format!("http://{}", fourth),
            ],
            user_agent: "test".into(),
        },
    );
    let request = ConversionRequest {
        target: "clash".into(),
        callback_url: "http://127.0.0.1:1/sub/abc?target=base64".into(),
        ..Default::default()
    };
    let primary = format!("http://{}", first);

    // Step through the attempts the way the pipeline does.
    let mut attempts = client.attempts(&primary, &request);
    let mut tried = Vec::new();
    let mut body = None;
    while let Some(attempt) = attempts.next().await {
        tried.push(attempt.endpoint().to_string());
        if let Attempt::Success(conversion) = attempt {
            body = Some(conversion.body);
            break;
        }
    }
    assert_eq!(tried.len(), 3);
    assert_eq!(tried[2], format!("http://{}/sub", third));
    assert_eq!(body.as_deref(), Some("converted by third"));

    let conversion = client.convert(&primary, &request).await.unwrap();
    assert_eq!(conversion.endpoint, format!("http://{}/sub", third));
    assert_eq!(third_hits.load(Ordering::SeqCst), 2);
    assert_eq!(fourth_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exhausted_backends_report_attempts() {
    let first = failing_backend(500).await;
    let second = failing_backend(502).await;
    let client = SubconverterClient::new(
        reqwest::Client::builder().no_proxy().build().unwrap(),
        &SubconverterConfig {
            timeout_secs: 2,
            deadline_secs: 10,
            fallbacks: vec![format!("http://{}", second)],
            user_agent: "test".into(),
        },
    );

    let err = client
        .convert(&format!("http://{}", first), &ConversionRequest::default())
        .await
        .unwrap_err();
    match err {
        SubconverterError::ConversionUnavailable { attempted, last_error } => {
            assert_eq!(
                attempted,
                vec![format!("http://{}/sub", first), format!("http://{}/sub", second)]
            );
            assert!(last_error.contains("502"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_backend_pulls_list_through_callback() {
    // Behaves like a real converter: fetch the callback URL, count the links.
    let converter = common::start_programmable_backend(|target| async move {
        let Some(callback) = query_param(&target, "url") else {
            return (500, "missing url".to_string());
        };
        if query_param(&target, "new_name").as_deref() != Some("true") {
            return (500, "missing new_name".to_string());
        }
        let body = common::client()
            .get(callback)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        (200, format!("proxies: {}", common::decode_list(&body).len()))
    })
    .await;

    let store = common::seeded_store(
        json!({"mytoken": "abc", "subConverter": format!("http://{}", converter)}),
        json!([
            {"id": "m1", "url": "vless://uuid@a.example.com:443#A", "enabled": true},
            {"id": "m2", "url": "trojan://pw@b.example.com:443#B", "enabled": true}
        ]),
        json!([]),
    );
    let server = common::spawn_server(common::test_config(), store).await;

    let res = common::client()
        .get(server.url("/sub/abc?clash"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), "proxies: 2");

    // A wrong callback token is not a re-entry: it goes to the converter again.
    let res = common::client()
        .get(server.url("/sub/abc?target=clash&callback_token=forged"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "proxies: 2");
}

#[tokio::test]
async fn test_degraded_responses() {
    let down = failing_backend(500).await;
    let store = common::seeded_store(
        json!({"mytoken": "abc", "subConverter": format!("http://{}", down)}),
        json!([{"id": "m1", "url": "vless://uuid@a.example.com:443#A", "enabled": true}]),
        json!([]),
    );
    let server = common::spawn_server(common::test_config(), store).await;
    let client = common::client();

    let res = client.get(server.url("/sub/abc?target=clash")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-subhub-fallback"], "yaml");
    assert_eq!(res.headers()[CONTENT_TYPE], "text/yaml; charset=utf-8");
    assert!(res.headers()["x-subhub-error"].to_str().unwrap().contains("500"));
    let yaml = res.text().await.unwrap();
    assert!(yaml.contains("proxy-groups:"));
    assert!(yaml.contains("MATCH,DIRECT"));

    let res = client.get(server.url("/sub/abc?singbox")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-subhub-fallback"], "base64");
    let links = common::decode_list(&res.text().await.unwrap());
    assert_eq!(links.len(), 1);
    assert_eq!(link_name(&links[0]), "手动节点 - A");
}

#[tokio::test]
async fn test_hanging_backends_degrade_within_request_deadline() {
    let mut backends = Vec::new();
    for _ in 0..4 {
        backends.push(format!("http://{}", common::start_silent_backend().await));
    }
    let store = common::seeded_store(
        json!({"mytoken": "abc", "subConverter": backends[0]}),
        json!([{"id": "m1", "url": "vless://uuid@a.example.com:443#A", "enabled": true}]),
        json!([]),
    );
    let mut config = common::test_config();
    config.subconverter.fallbacks = backends[1..].to_vec();
    config.subconverter.timeout_secs = 1;
    config.subconverter.deadline_secs = 2;
    config.timeouts.request_secs = 5;
    let server = common::spawn_server(config, store).await;

    let res = common::client()
        .get(server.url("/sub/abc?target=clash"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-subhub-fallback"], "yaml");
    assert!(res.headers()["x-subhub-error"].to_str().unwrap().contains("deadline"));
    assert!(res.text().await.unwrap().contains("proxy-groups:"));
}

#[tokio::test]
async fn test_empty_list_with_failed_conversion_is_bad_gateway() {
    let down = failing_backend(503).await;
    let store = common::seeded_store(
        json!({"mytoken": "abc", "subConverter": format!("http://{}", down)}),
        json!([]),
        json!([]),
    );
    let server = common::spawn_server(common::test_config(), store).await;

    let res = common::client()
        .get(server.url("/sub/abc?target=clash"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    let body = res.text().await.unwrap();
    assert!(body.contains(&format!("http://{}/sub", down)));
}

#[tokio::test]
async fn test_missing_backend_only_matters_for_conversion() {
    let store = common::seeded_store(
        json!({"mytoken": "abc", "subConverter": ""}),
        json!([{"id": "m1", "url": "vless://uuid@a.example.com:443#A", "enabled": true}]),
        json!([]),
    );
    let server = common::spawn_server(common::test_config(), store).await;
    let client = common::client();

    let res = client.get(server.url("/sub/abc?target=clash")).send().await.unwrap();
    assert_eq!(res.status(), 500);

    let res = client.get(server.url("/sub/abc?base64")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}
