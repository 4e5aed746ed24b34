//! Operator control surface.
//!
//! A small local HTTP API standing in for a desktop window: it only calls
//! lifecycle and configuration operations, it never owns proxy logic.
//!
//! | Route            | Effect                                  |
//! |------------------|-----------------------------------------|
//! | `GET  /status`   | server status and active configuration  |
//! | `POST /start`    | start with the active configuration     |
//! | `POST /stop`     | stop                                    |
//! | `POST /restart`  | restart with the active configuration   |
//! | `PUT  /config`   | validate and apply a new configuration  |

pub mod handlers;

use std::io;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::lifecycle::Shutdown;

pub fn control_router(state: ControlState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/restart", post(restart))
        .route("/config", put(apply_config))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the control API until `shutdown` is triggered.
pub async fn serve_control(
    listener: TcpListener,
    state: ControlState,
    shutdown: Shutdown,
) -> io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Control API listening");

    axum::serve(listener, control_router(state).into_make_service())
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    tracing::info!("Control API stopped");
    Ok(())
}
