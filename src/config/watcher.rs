//! Configuration file watcher for hot reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{BridgeConfig, ProposedConfiguration};

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<BridgeConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BridgeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    ///
    /// The parent directory is watched, so saves that rename a new file over
    /// the old one keep being seen. Editors tend to emit several events per
    /// save; a reload whose `[proxy]` section matches the previous one is not
    /// forwarded.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let file_name = path.file_name().map(|name| name.to_os_string());
        let mut last_proxy: Option<ProposedConfiguration> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!("Watch error: {:?}", e);
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create())
                    || !touches_file(&event, file_name.as_ref())
                {
                    return;
                }

                match load_config(&path) {
                    Ok((new_config, _)) => {
                        if last_proxy.as_ref() == Some(&new_config.proxy) {
                            tracing::debug!(path = ?path, "Config file touched, proxy section unchanged");
                            return;
                        }
                        tracing::info!(path = ?path, "Config file changed, queueing reload");
                        last_proxy = Some(new_config.proxy.clone());
                        let _ = tx.send(new_config);
                    }
                    Err(e) => {
                        tracing::error!(
                            path = ?path,
                            "Failed to reload config: {}. Keeping current configuration.",
                            e
                        );
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn touches_file(event: &Event, file_name: Option<&OsString>) -> bool {
    match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(name.as_os_str())),
        None => true,
    }
}
