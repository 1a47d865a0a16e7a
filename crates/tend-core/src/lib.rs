//! # Tend Core
//!
//! Domain types and pure decision logic for the tend note vault.
//!
//! This crate defines the note record, its on-disk document format, the
//! lifecycle state machine, and the vault directory layout. It performs no
//! I/O: storage lives in `tend-store`, orchestration in `tend-engine` and
//! `tend-pipeline`. Core defines the `Enricher` abstraction; concrete
//! enrichment backends are injected by higher-level crates.

#![warn(clippy::all)]

pub mod document;
pub mod enrich;
pub mod error;
pub mod fingerprint;
pub mod layout;
pub mod lifecycle;
pub mod types;

pub use document::{DocumentError, NoteDocument};
pub use enrich::{BodyDelta, Enricher, ScoreOutcome};
pub use error::{StorageError, StorageResult, ValidationError};
pub use fingerprint::content_fingerprint;
pub use layout::{DirRole, VaultLayout};
pub use lifecycle::{next_state, LifecycleEvent, RejectReason, TransitionContext};
pub use types::{NoteId, NoteRecord, NoteStatus, NoteType};
