//! # Tend Engine
//!
//! Orchestration for note promotion and orphan repair. This crate
//! coordinates; it implements no storage of its own. The promotion engine
//! asks the lifecycle state machine for permission, the vault layout for the
//! destination, and the atomic file store for the combined
//! status-update-plus-relocate. The orphan detector re-invokes the promotion
//! engine for every repair, so there is exactly one write path.

#![warn(clippy::all)]

mod orphans;
mod promotion;

pub use orphans::{OrphanDetector, OrphanKind, OrphanReport, RepairOutcome, RepairResult};
pub use promotion::{
    BatchOptions, BatchResult, EngineError, ItemOutcome, PromotionEngine, PromotionResult,
    SkipReason,
};
