//! Hot configuration swap.
//!
//! Validate → replace the active snapshot → restart. A rejected proposal
//! never touches the running server.

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{validate_proposed, ConfigValidationError, ProposedConfiguration, ProxyConfiguration};
use crate::lifecycle::manager::{LifecycleError, LifecycleHandle, ServerStatus};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Holds the active configuration and applies replacements.
pub struct ConfigurationUpdateManager {
    active: ArcSwap<ProxyConfiguration>,
    lifecycle: LifecycleHandle,
    apply_lock: Mutex<()>,
}

impl ConfigurationUpdateManager {
    pub fn new(initial: ProxyConfiguration, lifecycle: LifecycleHandle) -> Self {
        Self {
            active: ArcSwap::from_pointee(initial),
            lifecycle,
            apply_lock: Mutex::new(()),
        }
    }

    /// The configuration the next start will use.
    pub fn active(&self) -> Arc<ProxyConfiguration> {
        self.active.load_full()
    }

    pub fn lifecycle(&self) -> &LifecycleHandle {
        &self.lifecycle
    }

    /// Start the server with the active configuration.
    pub async fn start_active(&self) -> Result<ServerStatus, LifecycleError> {
        let _guard = self.apply_lock.lock().await;
        self.lifecycle.start(self.active().as_ref().clone()).await
    }

    /// Restart the server with the active configuration.
    pub async fn restart_active(&self) -> Result<ServerStatus, LifecycleError> {
        let _guard = self.apply_lock.lock().await;
        self.lifecycle.restart(self.active().as_ref().clone()).await
    }

    /// Validate `proposed`; on success make it active and restart onto it.
    ///
    /// Requests admitted under the old configuration finish independently;
    /// new connections are refused until the new listener is bound.
    pub async fn apply(&self, proposed: &ProposedConfiguration) -> Result<ServerStatus, UpdateError> {
        let config = match validate_proposed(proposed) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Configuration update rejected");
                return Err(e.into());
            }
        };

        // Serialize swap + restart so the active snapshot always matches the
        // last restart issued.
        let _guard = self.apply_lock.lock().await;
        let previous = self.active.swap(Arc::new(config.clone()));
        tracing::info!(
            backend = %config.backend_base_url,
            allowed_origin = %config.allowed_origin,
            bind = %config.bind_target(),
            previous_bind = %previous.bind_target(),
            "Applying configuration"
        );

        Ok(self.lifecycle.restart(config).await?)
    }
}
