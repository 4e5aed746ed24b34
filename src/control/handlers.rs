use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::{ProposedConfiguration, ProxyConfiguration};
use crate::http::response::error_body;
use crate::lifecycle::{ConfigurationUpdateManager, LifecycleError, ServerStatus, UpdateError};

pub type ControlState = Arc<ConfigurationUpdateManager>;

#[derive(Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub server: ServerStatus,
    pub active_configuration: ProxyConfiguration,
}

pub async fn get_status(State(updates): State<ControlState>) -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        server: updates.lifecycle().status(),
        active_configuration: updates.active().as_ref().clone(),
    })
}

pub async fn start(State(updates): State<ControlState>) -> Response {
    lifecycle_response(updates.start_active().await)
}

pub async fn stop(State(updates): State<ControlState>) -> Response {
    lifecycle_response(updates.lifecycle().stop().await)
}

pub async fn restart(State(updates): State<ControlState>) -> Response {
    lifecycle_response(updates.restart_active().await)
}

pub async fn apply_config(
    State(updates): State<ControlState>,
    Json(proposed): Json<ProposedConfiguration>,
) -> Response {
    match updates.apply(&proposed).await {
        Ok(status) => Json(status).into_response(),
        Err(UpdateError::Validation(e)) => {
            let problems: Vec<String> = e.problems.iter().map(ToString::to_string).collect();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": e.to_string(), "problems": problems })),
            )
                .into_response()
        }
        Err(UpdateError::Lifecycle(e)) => lifecycle_response(Err(e)),
    }
}

fn lifecycle_response(result: Result<ServerStatus, LifecycleError>) -> Response {
    match result {
        Ok(status) => Json(status).into_response(),
        Err(e @ LifecycleError::ManagerClosed) => {
            (StatusCode::SERVICE_UNAVAILABLE, error_body(e)).into_response()
        }
        Err(e) => (StatusCode::CONFLICT, error_body(e)).into_response(),
    }
}
