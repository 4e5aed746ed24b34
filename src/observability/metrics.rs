//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): requests by endpoint, outcome
//! - `bridge_request_duration_seconds` (histogram): time to first byte of the answer
//! - `bridge_server_state` (gauge): 0=stopped, 1=starting, 2=running, 3=stopping
//! - `bridge_lifecycle_transitions_total` (counter): transitions by target state
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::ServerState;

pub const ENDPOINT_GET_IMAGES: &str = "get_images";
pub const ENDPOINT_CONTENT: &str = "content";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, outcome: &'static str, started: Instant) {
    metrics::counter!("bridge_requests_total", "endpoint" => endpoint, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("bridge_request_duration_seconds", "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_server_state(state: ServerState) {
    let value = match state {
        ServerState::Stopped => 0.0,
        ServerState::Starting => 1.0,
        ServerState::Running => 2.0,
        ServerState::Stopping => 3.0,
    };
    metrics::gauge!("bridge_server_state").set(value);
    metrics::counter!("bridge_lifecycle_transitions_total", "state" => state.as_str()).increment(1);
}
