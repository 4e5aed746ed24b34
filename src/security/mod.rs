//! Security-relevant request and response decoration.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → cors.rs (preflight answers, access-control headers on every response)
//!     → headers.rs (hop-by-hop stripping, Host substitution for the backend)
//!     → Forwarded upstream
//! ```

pub mod cors;
pub mod headers;

pub use cors::CorsPolicy;
pub use headers::forwardable_headers;
