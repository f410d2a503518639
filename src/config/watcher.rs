//! Hot reload of the configuration file.
//!
//! # Data Flow
//! ```text
//! notify event on the parent directory
//!     → filtered to events naming the config file
//!     → loader.rs (parse + validate)
//!     → mpsc channel → server swaps it into ArcSwap<ApiConfig>
//! ```
//!
//! # Design Decisions
//! - The parent directory is watched, not the file, so editors that save by
//!   writing a temp file and renaming it over the original still trigger a
//!   reload
//! - A config that fails to load is dropped; the running one stays

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ApiConfig;

/// Watches one configuration file and forwards every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ApiConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ApiConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Whether `event` is a write, create or rename touching the config file.
    fn concerns_config(&self, event: &Event) -> bool {
        let kind_matches = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
        let file_name = self.path.file_name();
        kind_matches
            && event
                .paths
                .iter()
                .any(|p| p == &self.path || (file_name.is_some() && p.file_name() == file_name))
    }

    /// Load the file and forward it if valid. Returns whether an update was
    /// sent.
    pub fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "Configuration reloaded");
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring invalid configuration; keeping the running one"
                );
                false
            }
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let path = self.path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if self.concerns_config(&event) => {
                    self.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Watching configuration for changes");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use uuid::Uuid;

    fn temp_config(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("restaurant-api-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reload_forwards_valid_config() {
        let path = temp_config("[rate_limit]\nmax_requests = 7\n");
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        assert!(watcher.reload());
        let config = rx.try_recv().unwrap();
        assert_eq!(config.rate_limit.max_requests, 7);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reload_drops_invalid_config() {
        let path = temp_config("[rate_limit]\nwindow_secs = 0\n");
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        assert!(!watcher.reload());
        assert!(rx.try_recv().is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_event_filter() {
        let path = PathBuf::from("/etc/restaurant-api/config.toml");
        let (watcher, _rx) = ConfigWatcher::new(&path);

        let write = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone());
        assert!(watcher.concerns_config(&write));

        let renamed_over =
            Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert!(watcher.concerns_config(&renamed_over));

        let sibling = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/restaurant-api/other.toml"));
        assert!(!watcher.concerns_config(&sibling));

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path);
        assert!(!watcher.concerns_config(&removed));
    }
}
