//! Notify-backed watcher over the vault's tracked directories.

use crate::events::{ChangeEvent, ChangeKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tend_config::ScanConfig;
use tend_core::{NoteId, VaultLayout};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to start file watcher: {0}")]
    Backend(#[from] notify::Error),
}

/// Watches the four tracked directories (non-recursively) and emits one
/// [`ChangeEvent`] per note file created or modified. Deletions and events
/// for non-note files are dropped here.
pub struct VaultWatcher {
    // Dropping the backend stops the watch, so it rides along with the
    // receiver even though nothing reads it.
    _backend: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl VaultWatcher {
    /// Start watching. Events arrive on the returned watcher's channel until
    /// it is dropped.
    pub fn start(layout: Arc<VaultLayout>, config: ScanConfig) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let converter = EventConverter {
            layout: Arc::clone(&layout),
            config,
        };

        let mut backend =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for change in converter.convert(&event) {
                        debug!(id = %change.note_id, kind = ?change.kind, "vault change");
                        if tx.send(change).is_err() {
                            // Receiver dropped; the watcher is shutting down.
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "file watcher backend error"),
            })?;

        for (role, dir) in layout.tracked_dirs() {
            backend.watch(dir, RecursiveMode::NonRecursive)?;
            info!(role = ?role, dir = %dir.display(), "watching directory");
        }

        Ok(Self {
            _backend: backend,
            events: rx,
        })
    }

    /// Next change event, or `None` once the backend has shut down.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

/// Turns raw backend events into note change events.
struct EventConverter {
    layout: Arc<VaultLayout>,
    config: ScanConfig,
}

impl EventConverter {
    fn convert(&self, event: &Event) -> Vec<ChangeEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter_map(|path| self.convert_path(path, kind))
            .collect()
    }

    fn convert_path(&self, path: &Path, kind: ChangeKind) -> Option<ChangeEvent> {
        let role = self.layout.role_of(path)?;

        let name = path.file_name()?.to_str()?;
        if !self.config.include_hidden && name.starts_with('.') {
            return None;
        }

        let extension = path.extension()?.to_str()?.to_lowercase();
        if !self.config.extensions.iter().any(|ext| *ext == extension) {
            return None;
        }

        let stem = path.file_stem()?.to_str()?;
        Some(ChangeEvent::new(
            NoteId::from(stem),
            role,
            path.to_path_buf(),
            kind,
        ))
    }
}
