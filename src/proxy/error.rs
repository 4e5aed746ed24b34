//! Per-request upstream failures.
//!
//! These never escape the forwarding boundary as transport errors; the
//! HTTP layer renders them as `{"error": message}` payloads.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Coarse failure kind, used for status mapping and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpstreamErrorKind {
    UpstreamTimeout,
    UpstreamUnreachable,
    #[serde(rename = "UpstreamHTTPError")]
    UpstreamHttpError,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::UpstreamTimeout => "upstream_timeout",
            UpstreamErrorKind::UpstreamUnreachable => "upstream_unreachable",
            UpstreamErrorKind::UpstreamHttpError => "upstream_http_error",
        }
    }

    /// Status code used when the `status` error policy is selected.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UpstreamErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            UpstreamErrorKind::UpstreamUnreachable | UpstreamErrorKind::UpstreamHttpError => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Which proxy operation failed; selects the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ForwardJson,
    StreamContent,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::ForwardJson => f.write_str("Failed to reach scanner"),
            Operation::StreamContent => f.write_str("Failed to fetch image from scanner"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("Scanner service timed out. Make sure it is running on {backend}")]
    Timeout { backend: String },

    #[error("{operation}: {reason}")]
    Unreachable { operation: Operation, reason: String },

    #[error("{operation}: backend responded with {status} for {url}")]
    HttpStatus {
        operation: Operation,
        status: StatusCode,
        url: String,
    },

    #[error("{operation}: backend returned an invalid body: {reason}")]
    InvalidBody { operation: Operation, reason: String },
}

impl UpstreamError {
    pub(crate) fn unreachable(operation: Operation, reason: impl std::fmt::Display) -> Self {
        UpstreamError::Unreachable {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> UpstreamErrorKind {
        match self {
            UpstreamError::Timeout { .. } => UpstreamErrorKind::UpstreamTimeout,
            UpstreamError::Unreachable { .. } => UpstreamErrorKind::UpstreamUnreachable,
            UpstreamError::HttpStatus { .. } | UpstreamError::InvalidBody { .. } => {
                UpstreamErrorKind::UpstreamHttpError
            }
        }
    }
}
