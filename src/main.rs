//! Scanner Bridge
//!
//! Forwards a frontend's calls to a scanner service on another host/port and
//! answers with the CORS headers the scanner does not send itself.
//!
//! # Architecture Overview
//!
//! ```text
//!   Frontend ──▶ bind_host:bind_port ──▶ CORS ──▶ /get_images  ─┐
//!                                              └▶ /content/*  ─┴─▶ Scanner backend
//!
//!   Operator ──▶ control API / signals / config file watcher
//!                  └▶ ConfigurationUpdateManager ──▶ ServerLifecycleManager
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use scanner_bridge::config::{
    load_config, validate_config, validate_proposed, watcher::ConfigWatcher, BridgeConfig, PortInput,
};
use scanner_bridge::control::serve_control;
use scanner_bridge::lifecycle::signals::{SignalEvent, Signals};
use scanner_bridge::lifecycle::{
    ConfigurationUpdateManager, LifecycleTimings, ServerLifecycleManager, Shutdown,
};
use scanner_bridge::observability::{logging, metrics};
use scanner_bridge::ServingOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "scanner-bridge")]
#[command(about = "CORS bridge between a frontend and a scanner service", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scanner service base URL.
    #[arg(long)]
    backend_url: Option<String>,

    /// Frontend origin allowed by CORS.
    #[arg(long)]
    allowed_origin: Option<String>,

    /// Interface to listen on.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<String>,

    /// Control API bind address.
    #[arg(long)]
    control_address: Option<String>,

    /// Do not start the proxy until asked through the control API.
    #[arg(long)]
    no_autostart: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(url) = &self.backend_url {
            config.proxy.backend_base_url = url.clone();
        }
        if let Some(origin) = &self.allowed_origin {
            config.proxy.allowed_origin = origin.clone();
        }
        if let Some(host) = &self.host {
            config.proxy.bind_host = host.clone();
        }
        if let Some(port) = &self.port {
            config.proxy.bind_port = PortInput::Text(port.clone());
        }
        if let Some(addr) = &self.control_address {
            config.control.bind_address = addr.clone();
        }
    }
}

fn load_settings(cli: &Cli) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?.0,
        None => BridgeConfig::default(),
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let proxy_config = validate_config(&settings)?;

    logging::init_logging(&settings.observability)?;
    tracing::info!("scanner-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend = %proxy_config.backend_base_url,
        allowed_origin = %proxy_config.allowed_origin,
        bind = %proxy_config.bind_target(),
        upstream_timeout_secs = settings.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let lifecycle = ServerLifecycleManager::spawn(
        ServingOptions::from_config(&settings),
        LifecycleTimings::from_config(&settings),
    );
    let updates = Arc::new(ConfigurationUpdateManager::new(proxy_config, lifecycle.clone()));

    if !cli.no_autostart {
        // A bind failure is reported, not fatal: the operator can fix the
        // configuration through the control API.
        if let Err(e) = updates.start_active().await {
            tracing::error!(error = %e, "Proxy did not start");
        }
    }

    let control_shutdown = Shutdown::new();
    let control_task = if settings.control.enabled {
        match tokio::net::TcpListener::bind(&settings.control.bind_address).await {
            Ok(listener) => Some(tokio::spawn(serve_control(
                listener,
                updates.clone(),
                control_shutdown.clone(),
            ))),
            Err(e) => {
                tracing::error!(
                    address = %settings.control.bind_address,
                    error = %e,
                    "Control API unavailable"
                );
                None
            }
        }
    } else {
        None
    };

    // Keep the watcher alive for the lifetime of main.
    let _watcher = match (&cli.config, settings.control.watch_config) {
        (Some(path), true) => {
            let (watcher, mut config_updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => {
                    let updates = updates.clone();
                    let cli = cli.clone();
                    tokio::spawn(async move {
                        while let Some(mut new_config) = config_updates.recv().await {
                            cli.apply_overrides(&mut new_config);
                            if let Ok(candidate) = validate_proposed(&new_config.proxy) {
                                if *updates.active() == candidate {
                                    tracing::debug!("Reloaded proxy section matches the active one");
                                    continue;
                                }
                            }
                            if let Err(e) = updates.apply(&new_config.proxy).await {
                                tracing::error!(error = %e, "Reloaded configuration not applied");
                            }
                        }
                    });
                    Some(handle)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher unavailable");
                    None
                }
            }
        }
        _ => None,
    };

    let mut signals = Signals::install()?;
    loop {
        match signals.next().await {
            SignalEvent::Shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            SignalEvent::Reload => match &cli.config {
                Some(path) => match load_config(path) {
                    Ok((mut reloaded, _)) => {
                        cli.apply_overrides(&mut reloaded);
                        if let Err(e) = updates.apply(&reloaded.proxy).await {
                            tracing::error!(error = %e, "Reloaded configuration not applied");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
                },
                None => tracing::warn!("Reload requested but no config file was given"),
            },
        }
    }

    lifecycle.stop().await?;
    control_shutdown.trigger();
    if let Some(task) = control_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
