//! Forwarding, streaming and CORS behaviour through a running proxy.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use futures_util::StreamExt;
use serde_json::{json, Value};

use scanner_bridge::config::ErrorPolicy;
use scanner_bridge::proxy::{upstream_client, ContentStreamer, RequestForwarder, UpstreamErrorKind};
use scanner_bridge::ServingOptions;

mod common;

#[tokio::test]
async fn json_payload_round_trips() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let payload = json!({
        "folder": "scans/2024",
        "limit": 25,
        "filters": { "tags": ["front", "back"], "color": null, "dpi": 300.5 },
        "label": "grüße ✓"
    });

    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .json(&payload)
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, payload);
}

#[tokio::test]
async fn every_response_carries_cors_headers() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;
    let client = common::client();

    let res = client
        .post(format!("http://{}/get_images", proxy))
        .header("origin", common::ALLOWED_ORIGIN)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], common::ALLOWED_ORIGIN);
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    assert!(res.headers().contains_key("x-request-id"));

    // Failure responses are decorated too.
    let res = client
        .get(format!("http://{}/content/missing.png", proxy))
        .header("origin", common::ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], common::ALLOWED_ORIGIN);
}

#[tokio::test]
async fn preflight_mirrors_method_and_headers() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .request(reqwest::Method::OPTIONS, format!("http://{}/get_images", proxy))
        .header("origin", common::ALLOWED_ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,x-scanner-token")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], common::ALLOWED_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-allow-methods"], "POST");
    assert_eq!(
        headers["access-control-allow-headers"],
        "content-type,x-scanner-token"
    );
}

#[tokio::test]
async fn host_is_substituted_and_repeated_headers_kept() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .header("x-echo-headers", "1")
        .header("x-scan-tag", "first")
        .header("x-scan-tag", "second")
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["host"], backend.trim_start_matches("http://"));
    assert_eq!(body["x-scan-tag"], json!(["first", "second"]));
}

#[tokio::test]
async fn unreachable_backend_yields_error_payload() {
    let backend = common::unreachable_backend();
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .json(&json!({ "folder": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let message = body["error"].as_str().expect("error field");
    assert!(message.starts_with("Failed to reach scanner: "), "{}", message);
}

#[tokio::test]
async fn backend_http_error_follows_error_policy() {
    let backend = common::start_fixed_backend(StatusCode::INTERNAL_SERVER_ERROR, "{}").await;

    let (_payload, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;
    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("500"));

    let options = ServingOptions {
        error_policy: ErrorPolicy::Status,
        ..ServingOptions::default()
    };
    let (_status, proxy) = common::start_proxy(&backend, options).await;
    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn non_json_success_body_is_an_http_error() {
    let backend = common::start_fixed_backend(StatusCode::OK, "<html>scanner</html>").await;
    let forwarder = RequestForwarder::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_secs(5),
    );

    let err = forwarder
        .forward_json(Bytes::from_static(b"{}"), &HeaderMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), UpstreamErrorKind::UpstreamHttpError);
}

#[tokio::test]
async fn withheld_response_resolves_as_timeout() {
    let backend = common::start_silent_backend().await;
    let forwarder = RequestForwarder::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_millis(300),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        forwarder.forward_json(Bytes::from_static(b"{}"), &HeaderMap::new()),
    )
    .await
    .expect("forwarding must not hang past its own deadline");

    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), UpstreamErrorKind::UpstreamTimeout);
    assert!(err.to_string().contains(&backend), "{}", err);
}

#[tokio::test]
async fn timeout_is_rendered_as_error_payload() {
    let backend = common::start_slow_backend(Duration::from_secs(3)).await;
    let options = ServingOptions {
        upstream_timeout: Duration::from_millis(300),
        ..ServingOptions::default()
    };
    let (_lifecycle, proxy) = common::start_proxy(&backend, options).await;

    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        format!("Scanner service timed out. Make sure it is running on {}", backend)
    );
}

#[tokio::test]
async fn large_content_streams_with_fidelity() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .get(format!("http://{}/content/large.bin", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/octet-stream");

    let mut stream = res.bytes_stream();
    let mut total = 0usize;
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.expect("stream should complete");
        for (offset, byte) in chunk.iter().enumerate() {
            assert_eq!(*byte, common::pattern_byte(total + offset));
        }
        total += chunk.len();
        chunks += 1;
    }

    assert_eq!(total, common::LARGE_CONTENT_LEN);
    assert!(chunks > 1, "expected a chunked transfer, got {} chunk(s)", chunks);
}

#[tokio::test]
async fn content_streamer_yields_lazy_chunks() {
    let backend = common::start_scanner_backend().await;
    let streamer = ContentStreamer::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_secs(5),
    );

    let stream = streamer.stream_content("large.bin").await.unwrap();
    assert_eq!(stream.content_type().unwrap(), "application/octet-stream");

    let mut chunks = stream.into_chunks();
    let mut total = 0usize;
    let mut count = 0usize;
    while let Some(chunk) = chunks.next().await {
        total += chunk.unwrap().len();
        count += 1;
    }
    assert_eq!(total, common::LARGE_CONTENT_LEN);
    assert!(count > 1);
}

#[tokio::test]
async fn content_path_is_forwarded_raw() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .get(format!("http://{}/content/scans/page%201.png?thumb=1", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.text().await.unwrap(), "/content/scans/page%201.png");
}

#[tokio::test]
async fn missing_content_yields_error_payload() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .get(format!("http://{}/content/missing.png", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to fetch image from scanner: "), "{}", message);
    assert!(message.contains("404"));
}

#[tokio::test]
async fn json_reply_is_relayed_byte_for_byte() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;
    let raw = r#"{"zeta":1,"alpha":2,"id":123456789012345678901234567890,"ratio":0.1000}"#;

    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .header("content-type", "application/json")
        .body(raw)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), raw);
}

#[tokio::test]
async fn gzip_replies_are_decoded() {
    let backend = common::start_gzip_backend().await;
    let raw = r#"{"images":["scan-0001.png","scan-0002.png","scan-0003.png"],"total":3}"#;

    // The mock really compresses when asked.
    let direct = common::client()
        .post(format!("{}/get_images", backend))
        .header("accept-encoding", "gzip")
        .header("content-type", "application/json")
        .body(raw)
        .send()
        .await
        .unwrap();
    assert_eq!(direct.headers()["content-encoding"], "gzip");

    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;
    let res = common::client()
        .post(format!("http://{}/get_images", proxy))
        .header("accept-encoding", "gzip, deflate, br, zstd")
        .header("content-type", "application/json")
        .body(raw)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("content-encoding").is_none());
    assert_eq!(res.text().await.unwrap(), raw);
}

#[tokio::test]
async fn forwarder_decodes_gzip_without_caller_negotiation() {
    let backend = common::start_gzip_backend().await;
    let forwarder = RequestForwarder::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_secs(5),
    );
    let raw = r#"{"folder":"scans/2024","limit":25,"order":"newest-first"}"#;

    let payload = forwarder
        .forward_json(Bytes::from_static(raw.as_bytes()), &HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(payload.into_bytes(), raw.as_bytes());
}

#[tokio::test]
async fn content_headers_withheld_resolve_as_timeout() {
    let backend = common::start_silent_backend().await;
    let streamer = ContentStreamer::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_millis(300),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), streamer.stream_content("a.png"))
        .await
        .expect("streaming must not hang past its own deadline");
    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), UpstreamErrorKind::UpstreamTimeout);
    assert!(err.to_string().contains(&backend), "{}", err);
}

#[tokio::test]
async fn content_timeout_is_rendered_as_error_payload() {
    let backend = common::start_silent_backend().await;
    let options = ServingOptions {
        upstream_timeout: Duration::from_millis(300),
        ..ServingOptions::default()
    };
    let (_lifecycle, proxy) = common::start_proxy(&backend, options).await;

    let res = common::client()
        .get(format!("http://{}/content/a.png", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        format!("Scanner service timed out. Make sure it is running on {}", backend)
    );
}

#[tokio::test]
async fn unreachable_content_backend_yields_error_payload() {
    let backend = common::unreachable_backend();
    let streamer = ContentStreamer::new(
        &common::proxy_config(&backend, 0),
        upstream_client(),
        Duration::from_secs(5),
    );
    let err = streamer.stream_content("a.png").await.unwrap_err();
    assert_eq!(err.kind(), UpstreamErrorKind::UpstreamUnreachable);

    let options = ServingOptions {
        error_policy: ErrorPolicy::Status,
        ..ServingOptions::default()
    };
    let (_lifecycle, proxy) = common::start_proxy(&backend, options).await;
    let res = common::client()
        .get(format!("http://{}/content/a.png", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to fetch image from scanner: "), "{}", message);
}

#[tokio::test]
async fn broken_upstream_stream_truncates_response() {
    let backend = common::start_scanner_backend().await;
    let (_lifecycle, proxy) = common::start_proxy(&backend, ServingOptions::default()).await;

    let res = common::client()
        .get(format!("http://{}/content/truncated.bin", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/octet-stream");

    let transfer = async {
        let mut stream = res.bytes_stream();
        let mut received = 0usize;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => received += chunk.len(),
                Err(_) => return (received, true),
            }
        }
        (received, false)
    };
    let (received, broken) = tokio::time::timeout(Duration::from_secs(10), transfer)
        .await
        .expect("a broken upstream must end the transfer, not stall it");

    assert!(broken, "client should observe an incomplete body");
    assert!(received <= common::TRUNCATED_AFTER);
}
