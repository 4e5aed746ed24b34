//! JSON request forwarding.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use serde::de::IgnoredAny;
use tokio::time;
use tower::ServiceExt;

use crate::config::ProxyConfiguration;
use crate::proxy::error::{Operation, UpstreamError};
use crate::proxy::{backend_authority, describe_error, UpstreamClient, UpstreamResponse};
use crate::security::forwardable_headers;

/// Fixed backend path for image listing calls.
pub const GET_IMAGES_PATH: &str = "/get_images";

/// A backend JSON body, checked for well-formedness and kept byte for byte.
///
/// Never re-serialized, so key order and number precision are the backend's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPayload(Bytes);

impl JsonPayload {
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl IntoResponse for JsonPayload {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/json")], self.0).into_response()
    }
}

/// Relays a single JSON POST to the backend.
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    client: UpstreamClient,
    backend_base_url: String,
    authority: Option<HeaderValue>,
    timeout: Duration,
}

impl RequestForwarder {
    pub fn new(config: &ProxyConfiguration, client: UpstreamClient, timeout: Duration) -> Self {
        Self {
            client,
            backend_base_url: config.backend_base_url.clone(),
            authority: backend_authority(&config.backend_base_url),
            timeout,
        }
    }

    pub fn target_url(&self) -> String {
        format!("{}{}", self.backend_base_url, GET_IMAGES_PATH)
    }

    /// Forward `body` and `headers` and return the backend's JSON payload unchanged.
    ///
    /// Always resolves: timeouts, transport failures, non-2xx statuses and
    /// unparseable bodies come back as [`UpstreamError`].
    pub async fn forward_json(&self, body: Bytes, headers: &HeaderMap) -> Result<JsonPayload, UpstreamError> {
        let url = self.target_url();
        let uri: Uri = url
            .parse()
            .map_err(|e| UpstreamError::unreachable(Operation::ForwardJson, e))?;

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from(body))
            .map_err(|e| UpstreamError::unreachable(Operation::ForwardJson, e))?;
        *request.headers_mut() = forwardable_headers(headers, self.authority.as_ref());

        let exchange = async {
            let response: UpstreamResponse = self
                .client
                .clone()
                .oneshot(request)
                .await
                .map_err(|e| UpstreamError::unreachable(Operation::ForwardJson, describe_error(&e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(UpstreamError::HttpStatus {
                    operation: Operation::ForwardJson,
                    status,
                    url: url.clone(),
                });
            }

            let bytes = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
                .await
                .map_err(|e| UpstreamError::unreachable(Operation::ForwardJson, describe_error(&e)))?;

            serde_json::from_slice::<IgnoredAny>(&bytes).map_err(|e| UpstreamError::InvalidBody {
                operation: Operation::ForwardJson,
                reason: e.to_string(),
            })?;
            Ok(JsonPayload(bytes))
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                backend: self.backend_base_url.clone(),
            }),
        }
    }
}
