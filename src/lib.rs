//! Scanner bridge library: a CORS-injecting forwarder in front of a scanner
//! service, with an explicit server lifecycle and hot configuration swap.

pub mod config;
pub mod control;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod security;

pub use config::schema::{BridgeConfig, ProxyConfiguration};
pub use http::ServingOptions;
pub use lifecycle::{
    ConfigurationUpdateManager, LifecycleHandle, LifecycleTimings, ServerLifecycleManager,
    ServerState,
};
