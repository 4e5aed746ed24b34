//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and the lifecycle manager produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every forwarding log line

pub mod logging;
pub mod metrics;
