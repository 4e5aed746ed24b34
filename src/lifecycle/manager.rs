//! Server lifecycle state machine.
//!
//! # States
//! - Stopped: no listener, no serving loop
//! - Starting: listener bound, readiness probe running
//! - Running: serving loop accepting connections
//! - Stopping: graceful shutdown draining in-flight requests
//!
//! # State Transitions
//! ```text
//! Stopped  → Starting: start
//! Starting → Running:  bind succeeded (probe result is advisory)
//! Starting → Stopped:  bind failed
//! Running  → Stopping: stop
//! Stopping → Stopped:  serving task finished (listener dropped)
//! Running  → Stopped:  serving loop exited on its own
//! ```
//!
//! # Design Decisions
//! - Single-owner actor: every command goes through one queue, so
//!   transitions are linearizable without locking shared state
//! - Stop replies only after the serving task is gone, which is what
//!   allows restart to rebind the same port without a fixed sleep
//! - Status is published on a watch channel for observers

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{BridgeConfig, ProxyConfiguration};
use crate::http::{build_router, ServingOptions};
use crate::lifecycle::readiness::{probe_address, wait_until_ready};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{self, ListenerError};
use crate::observability::metrics;
use crate::proxy::{upstream_client, UpstreamClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the server as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub state: ServerState,
    /// Configuration bound to the current handle.
    pub configuration: Option<ProxyConfiguration>,
    pub local_addr: Option<SocketAddr>,
    /// Whether the readiness probe reached the listener.
    pub ready: bool,
    pub last_error: Option<String>,
}

impl ServerStatus {
    fn stopped(last_error: Option<String>) -> Self {
        Self {
            state: ServerState::Stopped,
            configuration: None,
            local_addr: None,
            ready: false,
            last_error,
        }
    }
}

/// Timing knobs for probing, draining and rebinding.
#[derive(Debug, Clone)]
pub struct LifecycleTimings {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub drain_timeout: Duration,
    pub rebind_window: Duration,
}

impl LifecycleTimings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let timeouts = &config.timeouts;
        Self {
            probe_interval: Duration::from_millis(timeouts.probe_interval_ms),
            probe_timeout: Duration::from_secs(timeouts.probe_timeout_secs),
            drain_timeout: Duration::from_secs(timeouts.drain_secs),
            rebind_window: Duration::from_millis(timeouts.rebind_window_ms),
        }
    }
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("lifecycle manager is no longer running")]
    ManagerClosed,
}

type Reply = oneshot::Sender<Result<ServerStatus, LifecycleError>>;

enum Command {
    Start {
        config: ProxyConfiguration,
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
    Restart {
        config: ProxyConfiguration,
        reply: Reply,
    },
    /// Sent by a serving task when its loop returns.
    Exited {
        generation: u64,
        error: Option<String>,
    },
}

/// One bound server generation.
struct ServerHandle {
    state: ServerState,
    should_stop: Shutdown,
    bound_configuration: ProxyConfiguration,
    local_addr: SocketAddr,
    ready: bool,
    generation: u64,
    task: JoinHandle<io::Result<()>>,
}

/// Owns the listener and serving loop; driven through a [`LifecycleHandle`].
pub struct ServerLifecycleManager {
    options: ServingOptions,
    timings: LifecycleTimings,
    client: UpstreamClient,
    current: Option<ServerHandle>,
    generation: u64,
    last_error: Option<String>,
    status_tx: watch::Sender<ServerStatus>,
    notify: mpsc::WeakUnboundedSender<Command>,
}

impl ServerLifecycleManager {
    /// Spawn the manager task. It exits, stopping any server, once every
    /// handle has been dropped.
    pub fn spawn(options: ServingOptions, timings: LifecycleTimings) -> LifecycleHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ServerStatus::stopped(None));

        let manager = Self {
            options,
            timings,
            client: upstream_client(),
            current: None,
            generation: 0,
            last_error: None,
            status_tx,
            notify: commands.downgrade(),
        };
        tokio::spawn(manager.run(rx));

        LifecycleHandle { commands, status }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start { config, reply } => {
                    let result = self.start(config, Duration::ZERO).await;
                    let _ = reply.send(result);
                }
                Command::Stop { reply } => {
                    let status = self.stop().await;
                    let _ = reply.send(Ok(status));
                }
                Command::Restart { config, reply } => {
                    tracing::info!(bind = %config.bind_target(), "Restarting server");
                    self.stop().await;
                    let result = self.start(config, self.timings.rebind_window).await;
                    let _ = reply.send(result);
                }
                Command::Exited { generation, error } => self.on_exited(generation, error),
            }
        }

        self.stop().await;
        tracing::debug!("Lifecycle manager exiting");
    }

    async fn start(
        &mut self,
        config: ProxyConfiguration,
        rebind_window: Duration,
    ) -> Result<ServerStatus, LifecycleError> {
        if let Some(handle) = &self.current {
            tracing::debug!(state = %handle.state, "Start ignored, server already active");
            return Ok(self.status());
        }

        self.last_error = None;
        self.publish(ServerStatus {
            state: ServerState::Starting,
            configuration: Some(config.clone()),
            local_addr: None,
            ready: false,
            last_error: None,
        });

        let handle = match self.launch(config, rebind_window).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Server failed to start");
                self.last_error = Some(e.to_string());
                self.publish_current();
                return Err(e);
            }
        };
        let probe = probe_address(handle.local_addr);
        self.current = Some(handle);
        self.publish_current();

        let probe_result =
            wait_until_ready(probe, self.timings.probe_interval, self.timings.probe_timeout).await;

        let Some(handle) = self.current.as_mut() else {
            return Ok(self.publish_current());
        };
        match probe_result {
            Ok(waited) => {
                tracing::info!(address = %handle.local_addr, waited = ?waited, "Proxy is accepting connections");
                handle.ready = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Readiness probe failed, serving loop left running");
                self.last_error = Some(e.to_string());
            }
        }
        handle.state = ServerState::Running;

        Ok(self.publish_current())
    }

    /// Build the router, bind, and spawn the serving loop.
    async fn launch(
        &mut self,
        config: ProxyConfiguration,
        rebind_window: Duration,
    ) -> Result<ServerHandle, LifecycleError> {
        let router = build_router(&config, &self.options, self.client.clone())
            .map_err(|e| LifecycleError::InvalidConfiguration(e.to_string()))?;

        let (listener, local_addr) = net::bind(&config.bind_target(), rebind_window).await?;

        self.generation += 1;
        let generation = self.generation;
        let should_stop = Shutdown::new();
        let stop_signal = should_stop.wait();
        let notify = self.notify.clone();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(stop_signal)
                .await;
            if let Some(tx) = notify.upgrade() {
                let _ = tx.send(Command::Exited {
                    generation,
                    error: result.as_ref().err().map(ToString::to_string),
                });
            }
            result
        });

        tracing::info!(
            address = %local_addr,
            backend = %config.backend_base_url,
            allowed_origin = %config.allowed_origin,
            generation,
            "Serving loop started"
        );

        Ok(ServerHandle {
            state: ServerState::Starting,
            should_stop,
            bound_configuration: config,
            local_addr,
            ready: false,
            generation,
            task,
        })
    }

    async fn stop(&mut self) -> ServerStatus {
        let Some(handle) = self.current.as_mut() else {
            tracing::debug!("Stop ignored, server already stopped");
            return self.status();
        };
        handle.state = ServerState::Stopping;
        handle.should_stop.trigger();
        self.publish_current();

        let Some(mut handle) = self.current.take() else {
            return self.publish_current();
        };
        let drain = self.timings.drain_timeout;
        match time::timeout(drain, &mut handle.task).await {
            Ok(Ok(Ok(()))) => tracing::debug!("Serving loop drained"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Serving loop ended with error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Serving task failed"),
            Err(_) => {
                tracing::warn!(drain = ?drain, "Drain deadline elapsed, aborting open connections");
                handle.task.abort();
                let _ = (&mut handle.task).await;
            }
        }
        tracing::info!(address = %handle.local_addr, "Listener released");

        self.publish_current()
    }

    fn on_exited(&mut self, generation: u64, error: Option<String>) {
        match &self.current {
            Some(handle) if handle.generation == generation => {
                let reason = error.unwrap_or_else(|| "serving loop exited".to_string());
                tracing::error!(
                    address = %handle.local_addr,
                    error = %reason,
                    "Serving loop exited unexpectedly"
                );
                self.current = None;
                self.last_error = Some(reason);
                self.publish_current();
            }
            _ => tracing::trace!(generation, "Ignoring exit of retired server generation"),
        }
    }

    fn status(&self) -> ServerStatus {
        match &self.current {
            Some(handle) => ServerStatus {
                state: handle.state,
                configuration: Some(handle.bound_configuration.clone()),
                local_addr: Some(handle.local_addr),
                ready: handle.ready,
                last_error: self.last_error.clone(),
            },
            None => ServerStatus::stopped(self.last_error.clone()),
        }
    }

    fn publish_current(&self) -> ServerStatus {
        let status = self.status();
        self.publish(status.clone());
        status
    }

    fn publish(&self, status: ServerStatus) {
        if self.status_tx.borrow().state != status.state {
            tracing::info!(state = %status.state, "Server state changed");
            metrics::record_server_state(status.state);
        }
        self.status_tx.send_replace(status);
    }
}

/// Cloneable front door to the lifecycle manager.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ServerStatus>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start { .. } => f.write_str("Start"),
            Command::Stop { .. } => f.write_str("Stop"),
            Command::Restart { .. } => f.write_str("Restart"),
            Command::Exited { generation, .. } => write!(f, "Exited({})", generation),
        }
    }
}

impl LifecycleHandle {
    /// Bind and serve `config`. A no-op while a server is active.
    pub async fn start(&self, config: ProxyConfiguration) -> Result<ServerStatus, LifecycleError> {
        self.request(|reply| Command::Start { config, reply }).await
    }

    /// Stop serving and release the listener. A no-op when stopped.
    pub async fn stop(&self) -> Result<ServerStatus, LifecycleError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Stop, wait for the listener to be released, then start `config`.
    pub async fn restart(&self, config: ProxyConfiguration) -> Result<ServerStatus, LifecycleError> {
        self.request(|reply| Command::Restart { config, reply }).await
    }

    /// Latest published status.
    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.clone()
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<ServerStatus, LifecycleError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| LifecycleError::ManagerClosed)?;
        response.await.map_err(|_| LifecycleError::ManagerClosed)?
    }
}
