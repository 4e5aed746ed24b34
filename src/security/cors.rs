//! Cross-origin policy for the proxy surface.
//!
//! Exactly one origin is allowed. Methods and request headers are mirrored
//! from the preflight, which is what "allow all" means once credentials are
//! enabled (a wildcard is not permitted alongside credentials).

use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::ProxyConfiguration;

/// Access-control decoration derived from the active configuration.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(config: &ProxyConfiguration) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            origin: HeaderValue::from_str(&config.allowed_origin)?,
        })
    }

    /// Tower layer applying the policy to every response.
    pub fn layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(self.origin.clone()))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}
