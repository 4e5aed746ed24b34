//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check URL and origin shape before anything is bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ProposedConfiguration → ProxyConfiguration
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BridgeConfig, ProposedConfiguration, ProxyConfiguration};

/// A single problem found in a proposed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationProblem {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("bind port {0} is not a number in 1..=65535")]
    InvalidPort(String),

    #[error("backend URL {url:?} is invalid: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("allowed origin {origin:?} is invalid: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Rejected configuration. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configuration rejected: {}", render_problems(.problems))]
pub struct ConfigValidationError {
    pub problems: Vec<ValidationProblem>,
}

fn render_problems(problems: &[ValidationProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a proposed configuration into an immutable snapshot.
pub fn validate_proposed(
    proposed: &ProposedConfiguration,
) -> Result<ProxyConfiguration, ConfigValidationError> {
    let mut problems = Vec::new();

    let backend = proposed.backend_base_url.trim();
    let origin = proposed.allowed_origin.trim();
    let host = proposed.bind_host.trim();

    if backend.is_empty() {
        problems.push(ValidationProblem::EmptyField("backend_base_url"));
    } else if let Err(reason) = check_backend_url(backend) {
        problems.push(ValidationProblem::InvalidBackendUrl {
            url: backend.to_string(),
            reason,
        });
    }

    if origin.is_empty() {
        problems.push(ValidationProblem::EmptyField("allowed_origin"));
    } else if let Err(reason) = check_origin(origin) {
        problems.push(ValidationProblem::InvalidOrigin {
            origin: origin.to_string(),
            reason,
        });
    }

    if host.is_empty() {
        problems.push(ValidationProblem::EmptyField("bind_host"));
    }

    let port = proposed.bind_port.to_port();
    if port.is_none() {
        problems.push(ValidationProblem::InvalidPort(proposed.bind_port.to_string()));
    }

    match port {
        Some(bind_port) if problems.is_empty() => Ok(ProxyConfiguration {
            backend_base_url: backend.trim_end_matches('/').to_string(),
            allowed_origin: origin.trim_end_matches('/').to_string(),
            bind_host: host.to_string(),
            bind_port,
        }),
        _ => Err(ConfigValidationError { problems }),
    }
}

/// Validate a whole config file: the proxy section plus timeouts.
pub fn validate_config(config: &BridgeConfig) -> Result<ProxyConfiguration, ConfigValidationError> {
    let mut problems = Vec::new();
    let timeouts = &config.timeouts;
    for (name, value) in [
        ("upstream_secs", timeouts.upstream_secs),
        ("probe_interval_ms", timeouts.probe_interval_ms),
        ("probe_timeout_secs", timeouts.probe_timeout_secs),
        ("drain_secs", timeouts.drain_secs),
        ("rebind_window_ms", timeouts.rebind_window_ms),
    ] {
        if value == 0 {
            problems.push(ValidationProblem::ZeroTimeout(name));
        }
    }

    match validate_proposed(&config.proxy) {
        Ok(proxy) if problems.is_empty() => Ok(proxy),
        Ok(_) => Err(ConfigValidationError { problems }),
        Err(mut e) => {
            e.problems.extend(problems);
            Err(e)
        }
    }
}

fn check_backend_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("scheme {:?} is not supported, use http", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}

fn check_origin(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme {:?} is not an http origin", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err("an origin is scheme, host and port only".to_string());
    }
    HeaderValue::from_str(raw.trim_end_matches('/')).map_err(|e| e.to_string())?;
    Ok(())
}
