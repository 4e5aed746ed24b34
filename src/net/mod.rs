//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfiguration (bind_host, bind_port)
//!     → listener.rs (resolve, bind, retry while port is released)
//!     → Hand off to the serving loop
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
