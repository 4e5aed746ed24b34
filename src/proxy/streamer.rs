//! Binary content streaming.
//!
//! Only the wait for response headers is bounded by the upstream timeout.
//! The body is handed back unbuffered; an error after that point can only
//! end the stream early.

use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{header, HeaderValue, Method, Request, Uri};
use tokio::time;
use tower::ServiceExt;

use crate::config::ProxyConfiguration;
use crate::proxy::error::{Operation, UpstreamError};
use crate::proxy::{backend_authority, describe_error, UpstreamClient, UpstreamResponse};

/// Backend path prefix for content downloads.
pub const CONTENT_PREFIX: &str = "/content/";

/// Relays GETs for binary content.
#[derive(Debug, Clone)]
pub struct ContentStreamer {
    client: UpstreamClient,
    backend_base_url: String,
    authority: Option<HeaderValue>,
    timeout: Duration,
}

/// A successfully opened upstream body.
///
/// Finite and single-use: reading it again needs a new call.
#[derive(Debug)]
pub struct ContentStream {
    content_type: Option<HeaderValue>,
    body: Body,
}

impl ContentStream {
    /// The backend's declared content type, if any.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// Lazy sequence of byte chunks as they arrive from the backend.
    pub fn into_chunks(self) -> BodyDataStream {
        self.body.into_data_stream()
    }
}

impl ContentStreamer {
    pub fn new(config: &ProxyConfiguration, client: UpstreamClient, timeout: Duration) -> Self {
        Self {
            client,
            backend_base_url: config.backend_base_url.clone(),
            authority: backend_authority(&config.backend_base_url),
            timeout,
        }
    }

    /// `path` is appended verbatim. Traversal checks are the backend's job.
    pub fn target_url(&self, path: &str) -> String {
        format!("{}{}{}", self.backend_base_url, CONTENT_PREFIX, path)
    }

    pub async fn stream_content(&self, path: &str) -> Result<ContentStream, UpstreamError> {
        let url = self.target_url(path);
        let uri: Uri = url
            .parse()
            .map_err(|e| UpstreamError::unreachable(Operation::StreamContent, e))?;

        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(authority) = &self.authority {
            builder = builder.header(header::HOST, authority.clone());
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| UpstreamError::unreachable(Operation::StreamContent, e))?;

        let pending = self.client.clone().oneshot(request);
        let response: UpstreamResponse = match time::timeout(self.timeout, pending).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(UpstreamError::unreachable(Operation::StreamContent, describe_error(&e)));
            }
            Err(_) => {
                return Err(UpstreamError::Timeout {
                    backend: self.backend_base_url.clone(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::HttpStatus {
                operation: Operation::StreamContent,
                status,
                url,
            });
        }

        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        Ok(ContentStream {
            content_type,
            body: Body::new(response.into_body()),
        })
    }
}
