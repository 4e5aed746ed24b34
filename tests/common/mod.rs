//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use scanner_bridge::config::ProxyConfiguration;
use scanner_bridge::lifecycle::{LifecycleHandle, LifecycleTimings, ServerLifecycleManager};
use scanner_bridge::ServingOptions;

pub const ALLOWED_ORIGIN: &str = "http://192.168.1.8:5173";
pub const LARGE_CONTENT_LEN: usize = 16 * 1024 * 1024;
pub const LARGE_CHUNK: usize = 64 * 1024;
/// Bytes `/content/truncated.bin` sends before the connection breaks.
pub const TRUNCATED_AFTER: usize = 4 * LARGE_CHUNK;

/// Byte at `i` of the large test resource.
pub fn pattern_byte(i: usize) -> u8 {
    (i % 251) as u8
}

/// Pick a port that is free right now.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn proxy_config(backend_base_url: &str, port: u16) -> ProxyConfiguration {
    ProxyConfiguration {
        backend_base_url: backend_base_url.to_string(),
        allowed_origin: ALLOWED_ORIGIN.to_string(),
        bind_host: "127.0.0.1".to_string(),
        bind_port: port,
    }
}

pub fn fast_timings() -> LifecycleTimings {
    LifecycleTimings {
        probe_interval: Duration::from_millis(20),
        probe_timeout: Duration::from_secs(2),
        drain_timeout: Duration::from_secs(5),
        rebind_window: Duration::from_secs(2),
    }
}

/// Non-pooled client: proxies restart under it in these tests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a proxy in front of `backend_base_url` on an ephemeral port.
pub async fn start_proxy(
    backend_base_url: &str,
    options: ServingOptions,
) -> (LifecycleHandle, SocketAddr) {
    let lifecycle = ServerLifecycleManager::spawn(options, fast_timings());
    let status = lifecycle
        .start(proxy_config(backend_base_url, 0))
        .await
        .expect("proxy should start");
    (lifecycle, status.local_addr.unwrap())
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

/// Mock scanner:
/// - `POST /get_images` echoes its body as JSON, or reports the received
///   headers when `x-echo-headers` is set
/// - `GET /content/large.bin` streams `LARGE_CONTENT_LEN` patterned bytes
/// - `GET /content/truncated.bin` sends `TRUNCATED_AFTER` bytes, then fails
/// - `GET /content/missing*` answers 404
/// - any other `/content/*` returns its raw request path as `image/png`
pub async fn start_scanner_backend() -> String {
    let router = Router::new()
        .route("/get_images", post(echo_images))
        .route("/content/{*path}", any(content));
    serve(router).await
}

async fn echo_images(headers: HeaderMap, body: Bytes) -> Response {
    if headers.contains_key("x-echo-headers") {
        let tags: Vec<&str> = headers
            .get_all("x-scan-tag")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
        return Json(json!({ "host": host, "x-scan-tag": tags })).into_response();
    }
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn content(uri: Uri) -> Response {
    let path = uri.path().to_string();
    if path == "/content/large.bin" {
        let chunks = (0..LARGE_CONTENT_LEN).step_by(LARGE_CHUNK).map(|start| {
            let end = (start + LARGE_CHUNK).min(LARGE_CONTENT_LEN);
            let chunk: Vec<u8> = (start..end).map(pattern_byte).collect();
            Ok::<_, std::io::Error>(Bytes::from(chunk))
        });
        return (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(stream::iter(chunks)),
        )
            .into_response();
    }
    if path == "/content/truncated.bin" {
        let sent = (0..TRUNCATED_AFTER / LARGE_CHUNK)
            .map(|i| Ok::<_, std::io::Error>(Bytes::from(vec![pattern_byte(i); LARGE_CHUNK])));
        // Let the head and the first chunks reach the proxy before breaking off.
        let broken = stream::once(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "scanner went away",
            ))
        });
        return (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(stream::iter(sent).chain(broken)),
        )
            .into_response();
    }
    if path.starts_with("/content/missing") {
        return (StatusCode::NOT_FOUND, "no such image").into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], path).into_response()
}

/// Echo scanner that gzips replies for clients that accept it.
pub async fn start_gzip_backend() -> String {
    let router = Router::new()
        .route("/get_images", post(echo_images))
        .layer(CompressionLayer::new());
    serve(router).await
}

/// Scanner that answers `/get_images` only after `delay`.
pub async fn start_slow_backend(delay: Duration) -> String {
    let router = Router::new().route(
        "/get_images",
        post(move |body: Bytes| async move {
            tokio::time::sleep(delay).await;
            ([(header::CONTENT_TYPE, "application/json")], body)
        }),
    );
    serve(router).await
}

/// Accepts connections and never answers.
pub async fn start_silent_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Answers every request with a fixed status and body.
pub async fn start_fixed_backend(status: StatusCode, body: &'static str) -> String {
    let router = Router::new().fallback(move || async move {
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    });
    serve(router).await
}

/// An address nothing listens on.
pub fn unreachable_backend() -> String {
    format!("http://127.0.0.1:{}", free_port())
}
