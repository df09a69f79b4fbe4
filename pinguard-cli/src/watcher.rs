use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use pinguard::core::is_config_file;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Recursive watcher for ESPHome YAML files
pub struct ConfigWatcher {
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    event_tx: broadcast::Sender<WatchEvent>,
    watched_path: Option<PathBuf>,
    delay: Duration,
}

impl ConfigWatcher {
    pub fn new(delay: Duration) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            debouncer: None,
            event_tx: tx,
            watched_path: None,
            delay,
        }
    }

    /// Start watching a file or directory. A file is watched through its
    /// parent directory.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.unwatch();

        let path = path
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))?;

        let watch_path = if path.is_file() {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| path.clone())
        } else {
            path
        };

        let (debounce_tx, debounce_rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(self.delay, debounce_tx)
            .context("Failed to create file watcher debouncer")?;
        debouncer
            .watcher()
            .watch(&watch_path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to start watching: {}", watch_path.display()))?;

        let event_tx = self.event_tx.clone();
        let root = watch_path.clone();
        // Ends once the debouncer, and with it the sender, is dropped.
        tokio::task::spawn_blocking(move || {
            while let Ok(result) = debounce_rx.recv() {
                match result {
                    Ok(events) => {
                        for event in events.iter().filter_map(|e| Self::process_debounced_event(&root, e)) {
                            debug!("watch event: {:?}", event);
                            let _ = event_tx.send(event);
                        }
                    }
                    Err(e) => error!("Watcher error: {:?}", e),
                }
            }
            debug!("watcher channel closed");
        });

        info!("watching {}", watch_path.display());
        self.debouncer = Some(debouncer);
        self.watched_path = Some(watch_path);
        Ok(())
    }

    pub fn unwatch(&mut self) {
        if let Some(mut debouncer) = self.debouncer.take() {
            if let Some(path) = &self.watched_path {
                let _ = debouncer.watcher().unwatch(path);
            }
        }
        self.watched_path = None;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.event_tx.subscribe()
    }

    pub fn watched_path(&self) -> Option<&PathBuf> {
        self.watched_path.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.debouncer.is_some() && self.watched_path.is_some()
    }

    /// The debouncer only reports paths; existence tells change from removal.
    fn process_debounced_event(root: &Path, event: &DebouncedEvent) -> Option<WatchEvent> {
        let path = &event.path;
        if !is_config_file(path) || is_hidden(path.strip_prefix(root).unwrap_or(path)) {
            return None;
        }
        if path.exists() {
            Some(WatchEvent::Changed(path.clone()))
        } else {
            Some(WatchEvent::Removed(path.clone()))
        }
    }
}

/// Editor swap files and `.esphome/` build output, relative to the root.
fn is_hidden(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => name.to_str().is_some_and(|s| s.starts_with('.')),
        _ => false,
    })
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.unwatch();
    }
}
