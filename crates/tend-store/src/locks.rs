//! Per-note write locks.
//!
//! Two concurrent operations on the same note id are serialized; the second
//! waits for the first's whole read-decide-write sequence to settle and then
//! observes the already-settled state. Operations on different notes do not
//! contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tend_core::NoteId;
use tokio::sync::OwnedMutexGuard;

/// Held write access to one note id. Store mutations run under it; callers
/// that read, decide, and then write hold it across the whole sequence so a
/// racing caller observes the settled state instead of a file that moved
/// under its feet.
pub struct NoteWriteGuard {
    id: NoteId,
    _guard: OwnedMutexGuard<()>,
}

impl NoteWriteGuard {
    pub fn id(&self) -> &NoteId {
        &self.id
    }
}

#[derive(Default)]
pub(crate) struct NoteLocks {
    locks: Mutex<HashMap<NoteId, Arc<tokio::sync::Mutex<()>>>>,
}

impl NoteLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock for one note.
    pub(crate) async fn acquire(&self, id: &NoteId) -> NoteWriteGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        NoteWriteGuard {
            id: id.clone(),
            _guard: lock.lock_owned().await,
        }
    }
}
