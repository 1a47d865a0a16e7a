//! # Tend Watch
//!
//! File system watching for the vault's tracked directories. Raw backend
//! events are filtered down to note-shaped changes ([`ChangeEvent`]) and
//! handed over a channel; deciding whether a change is worth acting on is
//! the concurrency guard's job, not the watcher's.

#![warn(clippy::all)]

mod events;
mod watcher;

pub use events::{ChangeEvent, ChangeKind};
pub use watcher::{VaultWatcher, WatchError};
