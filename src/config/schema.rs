//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the scanner bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Proxy target and bind settings (validated before use).
    pub proxy: ProposedConfiguration,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// How forwarding failures are rendered to the frontend.
    pub responses: ResponseConfig,

    /// Operator control surface.
    pub control: ControlConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Immutable snapshot of where to forward and where to listen.
///
/// Only produced by validation; a running server is bound to exactly one
/// snapshot and a new one replaces it via stop/start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyConfiguration {
    /// Absolute URL of the scanner service, without a trailing slash.
    pub backend_base_url: String,

    /// The single frontend origin allowed by CORS.
    pub allowed_origin: String,

    /// Interface address to listen on.
    pub bind_host: String,

    /// Listening port in `1..=65535`.
    pub bind_port: u16,
}

impl ProxyConfiguration {
    /// `host:port` form of the bind target.
    pub fn bind_target(&self) -> String {
        if self.bind_host.contains(':') && !self.bind_host.starts_with('[') {
            format!("[{}]:{}", self.bind_host, self.bind_port)
        } else {
            format!("{}:{}", self.bind_host, self.bind_port)
        }
    }
}

/// Unvalidated configuration as typed by an operator or read from disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProposedConfiguration {
    pub backend_base_url: String,
    pub allowed_origin: String,
    pub bind_host: String,
    pub bind_port: PortInput,
}

impl Default for ProposedConfiguration {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:15000".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            bind_host: "0.0.0.0".to_string(),
            bind_port: PortInput::Number(8000),
        }
    }
}

impl From<ProxyConfiguration> for ProposedConfiguration {
    fn from(config: ProxyConfiguration) -> Self {
        Self {
            backend_base_url: config.backend_base_url,
            allowed_origin: config.allowed_origin,
            bind_host: config.bind_host,
            bind_port: PortInput::Number(i64::from(config.bind_port)),
        }
    }
}

/// A port as entered: either a number or free text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PortInput {
    Number(i64),
    Text(String),
}

impl PortInput {
    /// Parse into a usable port, rejecting 0, out-of-range and non-numeric input.
    pub fn to_port(&self) -> Option<u16> {
        let value = match self {
            PortInput::Number(n) => *n,
            PortInput::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse::<i64>().ok()?
            }
        };
        match u16::try_from(value) {
            Ok(0) | Err(_) => None,
            Ok(port) => Some(port),
        }
    }
}

impl std::fmt::Display for PortInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortInput::Number(n) => write!(f, "{}", n),
            PortInput::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Timeout configuration for forwarding and lifecycle operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-call upstream timeout in seconds.
    pub upstream_secs: u64,

    /// Readiness probe poll interval in milliseconds.
    pub probe_interval_ms: u64,

    /// Overall readiness probe deadline in seconds.
    pub probe_timeout_secs: u64,

    /// How long a stop waits for in-flight requests before aborting.
    pub drain_secs: u64,

    /// How long a restart keeps retrying a port that is still in use.
    pub rebind_window_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 60,
            probe_interval_ms: 200,
            probe_timeout_secs: 10,
            drain_secs: 60,
            rebind_window_ms: 2000,
        }
    }
}

/// Rendering of per-request upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// HTTP 200 with `{"error": message}`.
    #[default]
    Payload,
    /// Same body, with 502/504 mapped from the failure kind.
    Status,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub error_policy: ErrorPolicy,

    /// Maximum inbound body size for forwarded JSON calls.
    pub max_body_bytes: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Payload,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Control surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Serve the control API.
    pub enabled: bool,

    /// Control API bind address. Keep this on loopback.
    pub bind_address: String,

    /// Re-apply the `[proxy]` section when the config file changes.
    pub watch_config: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8765".to_string(),
            watch_config: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
