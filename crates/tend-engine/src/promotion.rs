//! Promotion engine.
//!
//! A promotion is one atomic unit: lifecycle decision, destination
//! resolution, then a single `CombinedRelocateAndUpdate` through the file
//! store. Status and location can never diverge because no code path updates
//! one without the other.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tend_core::lifecycle::{next_state, LifecycleEvent, RejectReason, TransitionContext};
use tend_core::{
    DirRole, NoteId, NoteRecord, NoteStatus, NoteType, StorageError, ValidationError, VaultLayout,
};
use tend_store::{AtomicFileStore, NoteWriteGuard, ScannedNote, StoreOperation, VaultScanner};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failures that abort a single promotion. Lifecycle rejections are not
/// errors; they come back inside [`PromotionResult`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of `promote_one` for a single note.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Note was moved and its status updated.
    Promoted { resulting_path: PathBuf },
    /// Note already satisfied the requested state; nothing was written.
    NoOp { resulting_path: PathBuf },
    /// Dry run: this is what a real run would have done.
    WouldPromote { destination: PathBuf },
    /// The lifecycle state machine rejected the transition. No side effects.
    Rejected { reason: RejectReason },
}

/// Result of one promotion attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionResult {
    pub id: NoteId,
    pub outcome: ItemOutcome,
}

impl PromotionResult {
    /// Whether the note ends (or would end) in its promoted location.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, ItemOutcome::Rejected { .. })
    }
}

/// Why `auto_promote` skipped a note.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Rejected(RejectReason),
    /// Excluded by the batch's type filter, before any lifecycle decision.
    FilteredByType { actual: NoteType },
}

/// Options for a batch promotion pass.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Overrides the configured threshold when set.
    pub threshold: Option<f64>,
    pub type_filter: Option<NoteType>,
    pub dry_run: bool,
}

/// Aggregated outcome of a batch pass. One item's failure never aborts its
/// siblings; everything is accounted for per item.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub promoted: Vec<(NoteId, PathBuf)>,
    pub skipped: Vec<(NoteId, SkipReason)>,
    pub failed: Vec<(NoteId, String)>,
    /// True when the pass stopped early on a cancellation signal. Items
    /// processed before the stop are still reported above.
    pub cancelled: bool,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.promoted.len() + self.skipped.len() + self.failed.len()
    }
}

/// Transient eligibility view over one candidate. Built per batch pass,
/// discarded after use.
struct PromotionCandidate {
    record: NoteRecord,
    threshold: f64,
    type_filter: Option<NoteType>,
}

impl PromotionCandidate {
    /// A skip reason decidable before asking the state machine, or `None`
    /// when the candidate should proceed to `promote_one`.
    fn pre_filter(&self) -> Option<SkipReason> {
        if let Some(wanted) = self.type_filter {
            if self.record.note_type != wanted {
                return Some(SkipReason::FilteredByType {
                    actual: self.record.note_type,
                });
            }
        }
        // Inclusive comparison; a note that was never scored counts as 0.0
        // and never passes, not even at threshold 0.0.
        let score = self.record.effective_score();
        if self.record.quality_score.is_none() || score < self.threshold {
            return Some(SkipReason::Rejected(RejectReason::BelowThreshold {
                score,
                threshold: self.threshold,
            }));
        }
        None
    }
}

/// Orchestrates promotions. Thin by design: decisions belong to the
/// lifecycle state machine, writes to the atomic file store.
pub struct PromotionEngine {
    store: Arc<AtomicFileStore>,
    layout: Arc<VaultLayout>,
    scanner: VaultScanner,
    default_threshold: f64,
}

impl PromotionEngine {
    pub fn new(
        store: Arc<AtomicFileStore>,
        layout: Arc<VaultLayout>,
        scanner: VaultScanner,
        default_threshold: f64,
    ) -> Self {
        Self {
            store,
            layout,
            scanner,
            default_threshold,
        }
    }

    pub fn store(&self) -> &Arc<AtomicFileStore> {
        &self.store
    }

    /// Promote a single note at the configured threshold.
    pub async fn promote_one(
        &self,
        id: &NoteId,
        dry_run: bool,
    ) -> Result<PromotionResult, EngineError> {
        self.promote_with_threshold(id, self.default_threshold, dry_run)
            .await
    }

    /// Promote a single note at an explicit threshold.
    pub async fn promote_with_threshold(
        &self,
        id: &NoteId,
        threshold: f64,
        dry_run: bool,
    ) -> Result<PromotionResult, EngineError> {
        // The note's write lock covers the whole load-decide-apply sequence.
        // A concurrent promotion of the same note waits here, then loads the
        // already-settled state and takes the no-op branch below.
        let guard = self.store.lock_note(id).await;
        let (record, role, path) = match self.store.load(id).await {
            Ok(loaded) => loaded,
            Err(StorageError::NotFound { id }) => {
                return Err(ValidationError::NoteNotFound { id }.into())
            }
            Err(err) => return Err(err.into()),
        };

        // Idempotency: a note already settled in the right place is a no-op
        // success, not an error. A settled note in the wrong place is moved
        // there, which is also how orphan repair flows through this method.
        if record.status.is_settled() {
            let expected = self.layout.expected_dir(record.status, record.note_type)?;
            let destination = expected.join(id.file_name());
            if destination == path {
                debug!(id = %id, "already promoted; no-op");
                return Ok(PromotionResult {
                    id: id.clone(),
                    outcome: ItemOutcome::NoOp {
                        resulting_path: path,
                    },
                });
            }
            return self
                .settle(
                    &guard,
                    record,
                    path,
                    destination,
                    dry_run,
                    "relocating settled note",
                )
                .await;
        }

        let ctx = TransitionContext::new(record.note_type)
            .with_score(record.quality_score)
            .with_threshold(threshold)
            .at_location(role);

        match next_state(record.status, LifecycleEvent::Promote, &ctx) {
            Ok(next) => {
                let mut updated = record;
                updated.status = next;
                updated.mark_promoted_at(Utc::now());
                let expected = self.layout.expected_dir(next, updated.note_type)?;
                let destination = expected.join(id.file_name());
                self.settle(&guard, updated, path, destination, dry_run, "promoting note")
                    .await
            }
            Err(reason) => {
                debug!(id = %id, %reason, "promotion rejected");
                Ok(PromotionResult {
                    id: id.clone(),
                    outcome: ItemOutcome::Rejected { reason },
                })
            }
        }
    }

    /// Mark a promoted note as processed. Usually a metadata-only write:
    /// both statuses settle in the type directory, so the file moves only
    /// when it was out of place to begin with.
    pub async fn mark_processed(
        &self,
        id: &NoteId,
        dry_run: bool,
    ) -> Result<PromotionResult, EngineError> {
        let guard = self.store.lock_note(id).await;
        let (record, role, path) = match self.store.load(id).await {
            Ok(loaded) => loaded,
            Err(StorageError::NotFound { id }) => {
                return Err(ValidationError::NoteNotFound { id }.into())
            }
            Err(err) => return Err(err.into()),
        };

        let ctx = TransitionContext::new(record.note_type).at_location(role);
        match next_state(record.status, LifecycleEvent::MarkProcessed, &ctx) {
            Ok(next) => {
                let mut updated = record;
                updated.status = next;
                updated.mark_processed_at(Utc::now());
                let expected = self.layout.expected_dir(next, updated.note_type)?;
                let destination = expected.join(id.file_name());
                if destination == path {
                    if dry_run {
                        return Ok(PromotionResult {
                            id: id.clone(),
                            outcome: ItemOutcome::WouldPromote { destination },
                        });
                    }
                    self.store
                        .apply_locked(
                            &guard,
                            StoreOperation::WriteMetadata {
                                record: updated,
                                path: path.clone(),
                            },
                        )
                        .await?;
                    info!(id = %id, "note marked processed");
                    return Ok(PromotionResult {
                        id: id.clone(),
                        outcome: ItemOutcome::Promoted {
                            resulting_path: path,
                        },
                    });
                }
                self.settle(
                    &guard,
                    updated,
                    path,
                    destination,
                    dry_run,
                    "marking note processed",
                )
                .await
            }
            Err(reason) => {
                debug!(id = %id, %reason, "mark-processed rejected");
                Ok(PromotionResult {
                    id: id.clone(),
                    outcome: ItemOutcome::Rejected { reason },
                })
            }
        }
    }

    /// Repair entry point used by the orphan detector: recompute status from
    /// the note's physical location, then settle status and location through
    /// the same single write path promotions use.
    pub async fn repair_one(
        &self,
        id: &NoteId,
        dry_run: bool,
    ) -> Result<PromotionResult, EngineError> {
        let guard = self.store.lock_note(id).await;
        let (record, role, path) = match self.store.load(id).await {
            Ok(loaded) => loaded,
            Err(StorageError::NotFound { id }) => {
                return Err(ValidationError::NoteNotFound { id }.into())
            }
            Err(err) => return Err(err.into()),
        };

        // Settled status is authoritative: the file is moved to match it.
        if record.status.is_settled() {
            let expected = self.layout.expected_dir(record.status, record.note_type)?;
            let destination = expected.join(id.file_name());
            if destination == path {
                return Ok(PromotionResult {
                    id: id.clone(),
                    outcome: ItemOutcome::NoOp {
                        resulting_path: path,
                    },
                });
            }
            return self
                .settle(&guard, record, path, destination, dry_run, "repairing location")
                .await;
        }

        // Otherwise the location is authoritative: recompute the status.
        let ctx = TransitionContext::new(record.note_type).at_location(role);
        match next_state(record.status, LifecycleEvent::Repair, &ctx) {
            Ok(next) if next == record.status => Ok(PromotionResult {
                id: id.clone(),
                outcome: ItemOutcome::NoOp {
                    resulting_path: path,
                },
            }),
            Ok(next) => {
                let mut updated = record;
                updated.status = next;
                if next == NoteStatus::Promoted {
                    updated.mark_promoted_at(Utc::now());
                }
                let expected = self.layout.expected_dir(next, updated.note_type)?;
                let destination = expected.join(id.file_name());
                self.settle(&guard, updated, path, destination, dry_run, "repairing status")
                    .await
            }
            Err(reason) => Ok(PromotionResult {
                id: id.clone(),
                outcome: ItemOutcome::Rejected { reason },
            }),
        }
    }

    /// Apply the combined status-update-plus-relocate under the caller's
    /// write guard, or report what it would do under `dry_run`.
    async fn settle(
        &self,
        guard: &NoteWriteGuard,
        record: NoteRecord,
        from: PathBuf,
        to: PathBuf,
        dry_run: bool,
        action: &str,
    ) -> Result<PromotionResult, EngineError> {
        let id = record.id.clone();
        if dry_run {
            debug!(id = %id, to = %to.display(), "dry run: {action}");
            return Ok(PromotionResult {
                id,
                outcome: ItemOutcome::WouldPromote { destination: to },
            });
        }

        info!(id = %id, from = %from.display(), to = %to.display(), "{action}");
        let outcome = self
            .store
            .apply_locked(
                guard,
                StoreOperation::CombinedRelocateAndUpdate { record, from, to },
            )
            .await?;
        Ok(PromotionResult {
            id,
            outcome: ItemOutcome::Promoted {
                resulting_path: outcome.resulting_path,
            },
        })
    }

    /// Scan the inbox and promote every eligible note. Candidates are
    /// processed oldest first so identical inputs give identical output.
    pub async fn auto_promote(
        &self,
        options: BatchOptions,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let threshold = options.threshold.unwrap_or(self.default_threshold);
        let mut result = BatchResult::default();

        let mut candidates = Vec::new();
        for scanned in self.inbox_notes() {
            match self.store.load_at(&scanned.id, &scanned.path).await {
                Ok(record) if record.status == NoteStatus::Inbox => candidates.push(record),
                Ok(_) => {}
                Err(err) => {
                    warn!(id = %scanned.id, error = %err, "unreadable note skipped from batch");
                    result.failed.push((scanned.id, err.to_string()));
                }
            }
        }

        // Oldest first; id as tie-break keeps unstamped notes deterministic.
        candidates.sort_by(|a, b| {
            (a.created_at, &a.id).cmp(&(b.created_at, &b.id))
        });

        for record in candidates {
            if cancel.is_cancelled() {
                result.cancelled = true;
                info!("auto-promote cancelled; leaving remaining notes untouched");
                break;
            }

            let id = record.id.clone();
            let candidate = PromotionCandidate {
                record,
                threshold,
                type_filter: options.type_filter,
            };
            if let Some(reason) = candidate.pre_filter() {
                result.skipped.push((id, reason));
                continue;
            }

            match self
                .promote_with_threshold(&id, threshold, options.dry_run)
                .await
            {
                Ok(PromotionResult { outcome, .. }) => match outcome {
                    ItemOutcome::Promoted { resulting_path }
                    | ItemOutcome::NoOp { resulting_path } => {
                        result.promoted.push((id, resulting_path));
                    }
                    ItemOutcome::WouldPromote { destination } => {
                        result.promoted.push((id, destination));
                    }
                    ItemOutcome::Rejected { reason } => {
                        result.skipped.push((id, SkipReason::Rejected(reason)));
                    }
                },
                Err(err) => {
                    warn!(id = %id, error = %err, "promotion failed; batch continues");
                    result.failed.push((id, err.to_string()));
                }
            }
        }

        info!(
            promoted = result.promoted.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            dry_run = options.dry_run,
            "auto-promote pass finished"
        );
        result
    }

    fn inbox_notes(&self) -> Vec<ScannedNote> {
        self.scanner
            .scan()
            .into_iter()
            .filter(|note| note.role == DirRole::Inbox)
            .collect()
    }
}
