//! Configuration file watcher for hot reload of override rules.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Monitors the configuration file and forwards every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of the update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn spawn(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let reload_path = path.clone();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                match load_config(&reload_path) {
                    Ok(config) => {
                        tracing::info!(
                            path = ?reload_path,
                            "Configuration changed, reloading override rules"
                        );
                        if updates.send(config).is_err() {
                            tracing::debug!("Configuration receiver dropped");
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "Rejected configuration change, keeping current rules"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Configuration watch error"),
        };

        let mut watcher = RecommendedWatcher::new(
            handler,
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Configuration watcher started");
        Ok(watcher)
    }
}
