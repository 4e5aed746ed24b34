//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (manager.rs):
//!     Build router → Bind listener → Spawn serving loop → Readiness probe (readiness.rs)
//!
//! Stop (manager.rs, shutdown.rs):
//!     Set should_stop → Graceful drain (bounded) → Listener released
//!
//! Configuration swap (update.rs):
//!     Validate → Replace active snapshot → Restart
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop and exit
//!     SIGHUP → Reload config file and apply
//! ```
//!
//! # Design Decisions
//! - All transitions are serialized through one actor task
//! - Lifecycle commands never run on the serving loop
//! - Shutdown has a deadline: open connections are aborted after it

pub mod manager;
pub mod readiness;
pub mod shutdown;
pub mod signals;
pub mod update;

pub use manager::{
    LifecycleError, LifecycleHandle, LifecycleTimings, ServerLifecycleManager, ServerState,
    ServerStatus,
};
pub use readiness::ReadinessError;
pub use shutdown::Shutdown;
pub use update::{ConfigurationUpdateManager, UpdateError};
