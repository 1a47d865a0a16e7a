//! Error taxonomy for the vault engine.
//!
//! Three families, kept distinct so callers can tell them apart:
//! [`ValidationError`] (bad input, rejected before any write),
//! [`crate::lifecycle::RejectReason`] (state machine guard failed, a normal
//! outcome rather than an exception path), and [`StorageError`]
//! (backup/write/move failure — always leaves the location invariant intact
//! via rollback).

use crate::types::NoteId;
use thiserror::Error;

/// Input rejected before any write was attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A note type value with no recognized directory mapping.
    #[error("unknown note type: {value}")]
    UnknownType { value: String },

    /// The note id does not resolve to any tracked file.
    #[error("note not found: {id}")]
    NoteNotFound { id: NoteId },

    /// A note id that would escape the vault or collide with reserved names.
    #[error("invalid note id: {reason}")]
    InvalidNoteId { reason: String },

    /// Quality score outside `[0, 1]`.
    #[error("quality score {value} outside [0, 1]")]
    ScoreOutOfRange { value: f64 },
}

/// Failure inside the atomic file store.
///
/// Every variant implies the source file was left untouched (or restored from
/// backup). The store never retries internally; callers decide.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The pre-mutation backup could not be taken. Nothing was touched.
    #[error("backup failed for {id}: {source}")]
    BackupFailed {
        id: NoteId,
        #[source]
        source: std::io::Error,
    },

    /// Writing the staged copy failed. Source untouched.
    #[error("write failed for {id}: {source}")]
    WriteFailed {
        id: NoteId,
        #[source]
        source: std::io::Error,
    },

    /// Moving the staged copy into place failed. Staging cleaned up, source
    /// untouched.
    #[error("move failed for {id} ({from} -> {to}): {source}")]
    MoveFailed {
        id: NoteId,
        from: std::path::PathBuf,
        to: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The note file could not be read.
    #[error("read failed for {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The note's metadata header could not be parsed or rendered.
    #[error("document error for {id}: {reason}")]
    Document { id: NoteId, reason: String },

    /// No tracked directory holds a file for this note id.
    #[error("note not found: {id}")]
    NotFound { id: NoteId },

    /// Generic I/O failure outside the backup/write/move steps.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackupFailed { .. }
                | Self::WriteFailed { .. }
                | Self::MoveFailed { .. }
                | Self::Io(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
