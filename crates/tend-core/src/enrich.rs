//! Enrichment collaborator interface.
//!
//! Core defines the abstraction; scoring and body-enrichment backends live
//! outside this workspace's scope and are injected by higher-level crates.
//! The ingestion pipeline is the only caller, and only while a job is in its
//! `processing` state.

use crate::types::NoteRecord;
use anyhow::Result;
use std::collections::BTreeMap;

/// Output of the scoring collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Quality score in `[0, 1]`.
    pub quality_score: f64,
    pub tags: Vec<String>,
}

/// Output of the body-enrichment collaborator (OCR, transcript fetch, ...).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyDelta {
    /// Text appended to the note body. Empty means nothing to add.
    pub appended: String,
    /// Provenance fields recorded into the note's extra metadata.
    pub source_metadata: BTreeMap<String, serde_json::Value>,
}

/// External enrichment services consumed by the ingestion pipeline.
///
/// Failures map to the `enrichment_failed` lifecycle event; the pipeline owns
/// retry bookkeeping, implementations should not retry internally.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    /// Score a note's quality and suggest tags.
    async fn score(&self, record: &NoteRecord) -> Result<ScoreOutcome>;

    /// Fetch external content for the note body.
    async fn enrich_body(&self, record: &NoteRecord) -> Result<BodyDelta>;
}
