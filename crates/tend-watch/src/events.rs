//! Vault change events.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tend_core::{DirRole, NoteId};
use uuid::Uuid;

/// Kind of change observed on a note file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// A note file changed inside one of the tracked directories.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Unique identifier for this event.
    pub id: Uuid,
    pub note_id: NoteId,
    /// Directory the change was observed in.
    pub role: DirRole,
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(note_id: NoteId, role: DirRole, path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            note_id,
            role,
            path,
            kind,
            timestamp: Utc::now(),
        }
    }
}
