//! Response rendering for upstream failures.
//!
//! # Design Decisions
//! - Failures are always a JSON body `{"error": message}`
//! - The status code depends on the configured ErrorPolicy:
//!   200 for `payload`, 502/504 for `status`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ErrorPolicy;
use crate::proxy::UpstreamError;

pub fn error_body(message: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": message.to_string() }))
}

/// Render a structured upstream failure for the frontend.
pub fn upstream_error_response(policy: ErrorPolicy, err: &UpstreamError) -> Response {
    let status = match policy {
        ErrorPolicy::Payload => StatusCode::OK,
        ErrorPolicy::Status => err.kind().status_code(),
    };
    (status, error_body(err)).into_response()
}
