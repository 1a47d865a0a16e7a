//! Ingestion pipeline.
//!
//! One [`PipelineJob`] per accepted trigger, driven through draft →
//! processing → processed/failed. The pipeline owns retry bookkeeping and
//! idempotent re-entry; the enrichment collaborators are called only from
//! the processing state, and only after the concurrency guard has admitted
//! the trigger.

use crate::guard::{Admission, CircuitState, ConcurrencyGuard};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tend_config::PipelineConfig;
use tend_core::lifecycle::{next_state, LifecycleEvent, RejectReason, TransitionContext};
use tend_core::{
    content_fingerprint, BodyDelta, Enricher, NoteId, NoteRecord, NoteStatus, ScoreOutcome,
    StorageError,
};
use tend_store::{AtomicFileStore, StoreOperation};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failures that abort a trigger outright, as opposed to outcomes the job
/// records.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The resource's circuit breaker is open. Try again later; nothing was
    /// called and no budget was consumed.
    #[error("circuit open for resource '{resource}'")]
    CircuitOpen { resource: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// State of one pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Draft,
    Processing,
    Processed,
    Failed,
}

/// Successful enrichment result attached to a processed job.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOutcome {
    pub quality_score: f64,
    pub tags: Vec<String>,
    pub fingerprint: String,
}

/// Bookkeeping for one trigger. Created when the guard admits the trigger,
/// mutated only by the pipeline, retained until garbage collection.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub note_id: NoteId,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub result: Option<EnrichmentOutcome>,
    finished: Option<Instant>,
}

impl PipelineJob {
    fn new(note_id: NoteId) -> Self {
        Self {
            note_id,
            state: JobState::Draft,
            started_at: None,
            completed_at: None,
            attempt_count: 0,
            last_error: None,
            result: None,
            finished: None,
        }
    }

    /// `started_at` is set exactly once, on the first transition into
    /// processing.
    fn begin(&mut self) {
        self.state = JobState::Processing;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    fn finish(&mut self, state: JobState) {
        self.state = state;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.finished = Some(Instant::now());
    }
}

/// What became of a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Enrichment ran and succeeded.
    Processed(EnrichmentOutcome),
    /// Answered from the guard's result cache or a processed job; no
    /// external call was made.
    Cached(EnrichmentOutcome),
    /// Coalesced into an earlier trigger inside the cooldown window.
    Coalesced,
    /// The note's lifecycle state does not admit processing right now.
    Skipped(RejectReason),
    /// Enrichment failed and retries are exhausted.
    Failed { attempts: u32, last_error: String },
}

/// Draft → processing → processed/failed state tracking around the external
/// enrichment collaborators.
pub struct IngestionPipeline {
    store: Arc<AtomicFileStore>,
    enricher: Arc<dyn Enricher>,
    guard: Arc<ConcurrencyGuard>,
    config: PipelineConfig,
    jobs: tokio::sync::Mutex<HashMap<NoteId, PipelineJob>>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<AtomicFileStore>,
        enricher: Arc<dyn Enricher>,
        guard: Arc<ConcurrencyGuard>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            enricher,
            guard,
            config,
            jobs: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn guard(&self) -> &Arc<ConcurrencyGuard> {
        &self.guard
    }

    /// Snapshot of all retained jobs.
    pub async fn jobs(&self) -> Vec<PipelineJob> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// Drop finished jobs older than the retention window.
    pub async fn gc_jobs(&self) {
        let retention = self.config.job_retention();
        let now = Instant::now();
        let mut jobs = self.jobs.lock().await;
        jobs.retain(|_, job| match job.finished {
            Some(finished) => now.duration_since(finished) < retention,
            None => true,
        });
    }

    /// Handle one trigger for a note, typically from a watcher event.
    pub async fn trigger(&self, id: &NoteId) -> Result<TriggerOutcome, PipelineError> {
        if self.guard.admit(id) == Admission::Coalesced {
            return Ok(TriggerOutcome::Coalesced);
        }

        let (record, _, path) = self.store.load(id).await?;
        let fingerprint = content_fingerprint(&record.body);

        // An in-flight job absorbs the trigger. Re-triggering a processed
        // job is a no-op that returns the prior result as long as the
        // content is unchanged; changed content starts a fresh job.
        {
            let mut jobs = self.jobs.lock().await;
            if let Some(job) = jobs.get(id) {
                match job.state {
                    JobState::Processing => return Ok(TriggerOutcome::Coalesced),
                    JobState::Processed => match &job.result {
                        Some(result) if result.fingerprint == fingerprint => {
                            debug!(id = %id, "processed job re-triggered; returning prior result");
                            return Ok(TriggerOutcome::Cached(result.clone()));
                        }
                        _ => {
                            debug!(id = %id, "content changed since job completed; new job");
                            jobs.remove(id);
                        }
                    },
                    JobState::Draft | JobState::Failed => {}
                }
            }
        }

        if let Some(cached) = self.guard.cached(&fingerprint) {
            let outcome = EnrichmentOutcome {
                quality_score: cached.quality_score,
                tags: cached.tags,
                fingerprint: fingerprint.clone(),
            };
            self.complete_job(id, outcome.clone()).await;
            return Ok(TriggerOutcome::Cached(outcome));
        }

        let resource = resource_key(&record);
        if self.guard.check_breaker(&resource) == CircuitState::Open {
            let mut jobs = self.jobs.lock().await;
            let job = jobs.entry(id.clone()).or_insert_with(|| PipelineJob::new(id.clone()));
            job.last_error = Some(format!("circuit open for resource '{resource}'"));
            job.finish(JobState::Failed);
            return Err(PipelineError::CircuitOpen { resource });
        }

        // Ask the lifecycle state machine whether processing may begin.
        let attempt_count = {
            let jobs = self.jobs.lock().await;
            jobs.get(id).map(|j| j.attempt_count).unwrap_or(0)
        };
        let begin_event = match record.status {
            NoteStatus::Inbox => LifecycleEvent::BeginProcessing,
            // Status says processing but no live job exists (the earlier
            // job-table check would have coalesced the trigger): a previous
            // run was interrupted. Re-enter processing so the note is not
            // wedged.
            NoteStatus::Processing => LifecycleEvent::BeginProcessing,
            NoteStatus::Failed => LifecycleEvent::Retry,
            _ => {
                return Ok(TriggerOutcome::Skipped(RejectReason::InvalidTransition {
                    from: record.status,
                    event: LifecycleEvent::BeginProcessing,
                }))
            }
        };
        let ctx = TransitionContext::new(record.note_type)
            .with_attempts(attempt_count, self.config.max_attempts);
        let processing_status = match next_state(record.status, begin_event, &ctx) {
            Ok(status) => status,
            Err(reason) => {
                debug!(id = %id, %reason, "trigger skipped by lifecycle guard");
                return Ok(TriggerOutcome::Skipped(reason));
            }
        };

        self.run_job(id, record, path, processing_status, fingerprint, resource)
            .await
    }

    /// Run the enrichment attempts for one admitted job.
    async fn run_job(
        &self,
        id: &NoteId,
        record: NoteRecord,
        path: std::path::PathBuf,
        processing_status: NoteStatus,
        fingerprint: String,
        resource: String,
    ) -> Result<TriggerOutcome, PipelineError> {
        {
            let mut jobs = self.jobs.lock().await;
            let job = jobs.entry(id.clone()).or_insert_with(|| PipelineJob::new(id.clone()));
            job.begin();
        }

        // Persist the processing status so the declared state never lies
        // about what the engine is doing.
        let mut processing_record = record.clone();
        processing_record.status = processing_status;
        self.store
            .apply(StoreOperation::WriteMetadata {
                record: processing_record.clone(),
                path: path.clone(),
            })
            .await?;

        let mut last_error = String::new();
        loop {
            let attempt = {
                let mut jobs = self.jobs.lock().await;
                let job = jobs.get_mut(id).expect("job created above");
                job.attempt_count += 1;
                job.attempt_count
            };

            debug!(id = %id, attempt, "enrichment attempt");
            match self.enrich_once(&processing_record).await {
                Ok((outcome, delta)) => {
                    self.guard.record_outcome(&resource, true);

                    let updated = apply_enrichment(&processing_record, &outcome, &delta);
                    self.store
                        .apply(StoreOperation::WriteMetadata {
                            record: updated,
                            path: path.clone(),
                        })
                        .await?;

                    let enrichment = EnrichmentOutcome {
                        quality_score: outcome.quality_score,
                        tags: outcome.tags.clone(),
                        fingerprint: fingerprint.clone(),
                    };
                    self.guard.store_result(&fingerprint, outcome);
                    self.complete_job(id, enrichment.clone()).await;
                    info!(id = %id, attempt, "enrichment succeeded");
                    return Ok(TriggerOutcome::Processed(enrichment));
                }
                Err(err) => {
                    self.guard.record_outcome(&resource, false);
                    last_error = err.to_string();
                    warn!(id = %id, attempt, error = %last_error, "enrichment attempt failed");

                    if attempt >= self.config.max_attempts {
                        break;
                    }
                    let backoff = self.config.initial_backoff() * 2u32.pow(attempt - 1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        // Retries exhausted: the note goes to failed and the job finishes.
        let mut failed_record = processing_record;
        failed_record.status = next_state(
            NoteStatus::Processing,
            LifecycleEvent::EnrichmentFailed,
            &TransitionContext::new(failed_record.note_type),
        )
        .unwrap_or(NoteStatus::Failed);
        self.store
            .apply(StoreOperation::WriteMetadata {
                record: failed_record,
                path,
            })
            .await?;

        let attempts = {
            let mut jobs = self.jobs.lock().await;
            let job = jobs.get_mut(id).expect("job created above");
            job.last_error = Some(last_error.clone());
            job.finish(JobState::Failed);
            job.attempt_count
        };
        Ok(TriggerOutcome::Failed {
            attempts,
            last_error,
        })
    }

    /// Score first, then fetch body enrichment. Either failing fails the
    /// attempt.
    async fn enrich_once(
        &self,
        record: &NoteRecord,
    ) -> anyhow::Result<(ScoreOutcome, BodyDelta)> {
        let score = self.enricher.score(record).await?;
        let delta = self.enricher.enrich_body(record).await?;
        Ok((score, delta))
    }

    async fn complete_job(&self, id: &NoteId, outcome: EnrichmentOutcome) {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.entry(id.clone()).or_insert_with(|| PipelineJob::new(id.clone()));
        if job.started_at.is_none() {
            job.begin();
        }
        job.result = Some(outcome);
        job.last_error = None;
        job.finish(JobState::Processed);
    }
}

/// Merge a successful enrichment into the note record: score recorded, tags
/// unioned, fetched content appended, provenance kept in the extra map, and
/// status back to inbox so the note is promotable.
fn apply_enrichment(record: &NoteRecord, outcome: &ScoreOutcome, delta: &BodyDelta) -> NoteRecord {
    let mut updated = record.clone();
    updated.quality_score = Some(outcome.quality_score);
    for tag in &outcome.tags {
        if !updated.tags.contains(tag) {
            updated.tags.push(tag.clone());
        }
    }
    if !delta.appended.is_empty() {
        updated.body.push_str(&delta.appended);
    }
    for (key, value) in &delta.source_metadata {
        // Provenance fields are additive; a field the author already owns is
        // never overwritten.
        if !updated.extra.contains_key(key) {
            if let Ok(value) = serde_yaml::to_value(value) {
                updated.extra.insert(key.clone(), value);
            }
        }
    }
    updated.status = next_state(
        NoteStatus::Processing,
        LifecycleEvent::EnrichmentSucceeded,
        &TransitionContext::new(record.note_type).with_score(Some(outcome.quality_score)),
    )
    .unwrap_or(NoteStatus::Inbox);
    updated
}

/// Breaker key for a note's external resource: explicit source reference
/// when the note has one, otherwise the note itself.
fn resource_key(record: &NoteRecord) -> String {
    record
        .extra
        .get("source_url")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| record.id.to_string())
}
