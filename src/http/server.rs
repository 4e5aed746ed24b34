//! HTTP server setup for the proxy surface.
//!
//! # Responsibilities
//! - Create the Axum Router for one ProxyConfiguration snapshot
//! - Wire up middleware (CORS, tracing, request ID, body limit)
//! - Relay `/get_images` and `/content/*` to the backend
//! - Render upstream failures per the configured policy

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, header::InvalidHeaderValue, HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::TryStreamExt;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{BridgeConfig, ErrorPolicy, ProxyConfiguration};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::upstream_error_response;
use crate::observability::metrics;
use crate::proxy::{ContentStreamer, RequestForwarder, UpstreamClient, CONTENT_PREFIX};
use crate::security::CorsPolicy;

/// Settings that stay fixed across configuration swaps.
#[derive(Debug, Clone)]
pub struct ServingOptions {
    pub upstream_timeout: Duration,
    pub error_policy: ErrorPolicy,
    pub max_body_bytes: usize,
}

impl ServingOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            error_policy: config.responses.error_policy,
            max_body_bytes: config.responses.max_body_bytes,
        }
    }
}

impl Default for ServingOptions {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<RequestForwarder>,
    pub streamer: Arc<ContentStreamer>,
    pub error_policy: ErrorPolicy,
}

/// Build the proxy router bound to one configuration snapshot.
pub fn build_router(
    config: &ProxyConfiguration,
    options: &ServingOptions,
    client: UpstreamClient,
) -> Result<Router, InvalidHeaderValue> {
    let cors = CorsPolicy::new(config)?;
    let state = AppState {
        forwarder: Arc::new(RequestForwarder::new(
            config,
            client.clone(),
            options.upstream_timeout,
        )),
        streamer: Arc::new(ContentStreamer::new(config, client, options.upstream_timeout)),
        error_policy: options.error_policy,
    };

    Ok(Router::new()
        .route("/get_images", post(get_images))
        .route("/content/{*path}", get(proxy_content))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer())
                .layer(cors.layer())
                .layer(DefaultBodyLimit::max(options.max_body_bytes)),
        ))
}

/// POST /get_images: forward body and headers, answer with the backend's JSON.
async fn get_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();

    tracing::debug!(
        request_id = %request_id,
        url = %state.forwarder.target_url(),
        body_len = body.len(),
        "Forwarding JSON request"
    );

    match state.forwarder.forward_json(body, &headers).await {
        Ok(payload) => {
            metrics::record_request(metrics::ENDPOINT_GET_IMAGES, "ok", start);
            payload.into_response()
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                kind = e.kind().as_str(),
                error = %e,
                "Forwarding failed"
            );
            metrics::record_request(metrics::ENDPOINT_GET_IMAGES, e.kind().as_str(), start);
            upstream_error_response(state.error_policy, &e)
        }
    }
}

/// GET /content/{path}: stream the backend body with its content type.
async fn proxy_content(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();
    // Raw, still percent-encoded remainder; the query string is dropped.
    let path = uri.path().strip_prefix(CONTENT_PREFIX).unwrap_or_default();

    match state.streamer.stream_content(path).await {
        Ok(stream) => {
            metrics::record_request(metrics::ENDPOINT_CONTENT, "ok", start);
            let content_type = stream.content_type().cloned();
            let chunks = stream.into_chunks().inspect_err(move |e| {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Upstream stream ended early, transfer truncated"
                );
            });

            let mut response = Body::from_stream(chunks).into_response();
            if let Some(content_type) = content_type {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            response
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                kind = e.kind().as_str(),
                error = %e,
                "Content fetch failed"
            );
            metrics::record_request(metrics::ENDPOINT_CONTENT, e.kind().as_str(), start);
            upstream_error_response(state.error_policy, &e)
        }
    }
}
