//! # Tend Store
//!
//! The single write path for note files. Every mutation of a tracked note —
//! metadata rewrite, relocation, or the combined status-update-plus-move —
//! goes through [`AtomicFileStore::apply`], which backs up before touching
//! anything and rolls back on partial failure. Higher layers (the promotion
//! engine, the orphan detector) are thin callers; none of them writes note
//! files directly.

#![warn(clippy::all)]

mod backup;
mod locks;
mod scanner;
mod store;

pub use backup::BackupArea;
pub use locks::NoteWriteGuard;
pub use scanner::{ScannedNote, VaultScanner};
pub use store::{AtomicFileStore, StoreOperation, StoreOutcome};
