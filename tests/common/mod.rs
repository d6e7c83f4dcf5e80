//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use subhub::config::ServiceConfig;
use subhub::lifecycle::Shutdown;
use subhub::store::{MemoryStore, StoreKey};
use subhub::HttpServer;

/// Read the request head and return the request target (path + query).
async fn read_request_target(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a mock backend that returns a fixed body.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a programmable mock backend. The handler receives the request target.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let target = read_request_target(&mut socket).await;
                        let (status, body) = f(target).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Mock backend that counts the requests it served.
pub async fn start_counting_backend(body: impl Into<String>) -> (SocketAddr, Arc<AtomicUsize>) {
    let body: String = body.into();
    let body: Arc<str> = Arc::from(body);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let addr = start_programmable_backend(move |_| {
        let counter = counter.clone();
        let body = body.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (200, body.to_string())
        }
    })
    .await;
    (addr, hits)
}

/// Service config for tests: no built-in fallbacks, short timeouts.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.subconverter.fallbacks.clear();
    config.subconverter.timeout_secs = 2;
    config.subconverter.deadline_secs = 5;
    config.fetch.timeout_secs = 2;
    config.timeouts.request_secs = 10;
    config.callback.secret = "test-secret".into();
    config
}

/// Memory store seeded with the three documents.
pub fn seeded_store(settings: Value, subscriptions: Value, profiles: Value) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.set(StoreKey::Settings, settings);
    store.set(StoreKey::Subscriptions, subscriptions);
    store.set(StoreKey::Profiles, profiles);
    Arc::new(store)
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the service on an ephemeral port. Callbacks point back at it.
pub async fn spawn_server(mut config: ServiceConfig, store: Arc<MemoryStore>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    if config.callback.public_url.is_none() {
        config.callback.public_url = Some(format!("http://{}", addr));
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, store);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Decode a base64 subscription body into its links.
pub fn decode_list(body: &str) -> Vec<String> {
    let bytes = STANDARD.decode(body.trim()).expect("body is base64");
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

/// Links encoded as a subscription body.
pub fn encode_list(links: &[&str]) -> String {
    STANDARD.encode(links.join("\n"))
}
