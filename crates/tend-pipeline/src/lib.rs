//! # Tend Pipeline
//!
//! The ingestion side of the vault: a draft → processing → processed/failed
//! job state machine around the external enrichment collaborators, fronted
//! by a concurrency guard. The guard is the sole subscriber of watcher
//! events; nothing reaches the enricher without passing its cooldown, result
//! cache, and circuit breaker first. That layering is what keeps a
//! file-watcher feedback loop from turning into an unbounded stream of
//! external API calls.

#![warn(clippy::all)]

mod enricher;
mod guard;
mod pipeline;

pub use enricher::HeuristicEnricher;
pub use guard::{Admission, CircuitState, ConcurrencyGuard, GuardStats};
pub use pipeline::{
    EnrichmentOutcome, IngestionPipeline, JobState, PipelineError, PipelineJob, TriggerOutcome,
};
