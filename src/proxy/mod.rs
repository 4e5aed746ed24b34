//! Forwarding to the scanner backend.
//!
//! # Data Flow
//! ```text
//! POST /get_images  → forwarder.rs (buffered JSON call, 60s deadline)
//! GET  /content/*   → streamer.rs (headers under deadline, body streamed lazily)
//!                   → error.rs (structured failure, never a transport fault)
//! ```
//!
//! # Design Decisions
//! - One pooled upstream client per lifecycle manager, shared across restarts
//! - No retries, no caching: each call is independent
//! - Forwarders are parameterized by a ProxyConfiguration, never re-wired

pub mod error;
pub mod forwarder;
pub mod streamer;

use axum::body::Body;
use axum::http::{HeaderValue, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::ServiceBuilder;
use tower_http::decompression::{Decompression, DecompressionBody, DecompressionLayer};

pub use error::{Operation, UpstreamError, UpstreamErrorKind};
pub use forwarder::{JsonPayload, RequestForwarder, GET_IMAGES_PATH};
pub use streamer::{ContentStream, ContentStreamer, CONTENT_PREFIX};

/// HTTP client used for every upstream call.
///
/// Advertises gzip upstream and decodes compressed replies, so callers always
/// see identity bodies.
pub type UpstreamClient = Decompression<Client<HttpConnector, Body>>;

/// Response head plus unread (decoded) body, as returned by [`UpstreamClient`].
pub type UpstreamResponse = hyper::Response<DecompressionBody<hyper::body::Incoming>>;

pub fn upstream_client() -> UpstreamClient {
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    ServiceBuilder::new()
        .layer(DecompressionLayer::new())
        .service(client)
}

/// `host:port` of the backend, used as the forwarded Host header.
pub(crate) fn backend_authority(backend_base_url: &str) -> Option<HeaderValue> {
    let uri: Uri = backend_base_url.parse().ok()?;
    HeaderValue::from_str(uri.authority()?.as_str()).ok()
}

/// Render an error with its source chain; client errors hide the cause otherwise.
pub(crate) fn describe_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
