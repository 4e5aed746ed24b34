//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfiguration (validated, immutable)
//!     → handed to the lifecycle manager on start
//!
//! On file change or SIGHUP:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → ConfigurationUpdateManager swaps the snapshot and restarts
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; changes require stop/start
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BridgeConfig, ErrorPolicy, PortInput, ProposedConfiguration, ProxyConfiguration,
    TimeoutConfig,
};
pub use validation::{validate_config, validate_proposed, ConfigValidationError, ValidationProblem};
