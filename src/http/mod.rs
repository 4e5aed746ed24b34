//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (serving loop owned by the lifecycle manager)
//!     → request.rs (assign request ID)
//!     → security::cors (preflight, access-control headers)
//!     → server.rs (handler: forward JSON or stream content)
//!     → response.rs (render structured upstream failures)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, ServingOptions};
