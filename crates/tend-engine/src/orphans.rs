//! Orphan detection and repair.
//!
//! An orphan is a note whose declared status and physical location disagree.
//! The scan only reports; every repair is delegated to
//! [`PromotionEngine::repair_one`] so status and location are reconciled
//! through the same atomic write path promotions use.

use crate::promotion::{EngineError, ItemOutcome, PromotionEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tend_core::{DirRole, NoteId, NoteStatus, NoteType, ValidationError};
use tend_store::VaultScanner;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a note's status and location disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanKind {
    /// Status says settled, file never moved (or moved to the wrong
    /// directory). The status is authoritative; repair moves the file.
    StatusAheadOfLocation,
    /// File was physically moved, status is stale. The location is
    /// authoritative; repair recomputes the status.
    LocationAheadOfStatus,
    /// The record has no recognized directory mapping (settled status with
    /// unknown type). Requires operator resolution; never silently skipped.
    UnsupportedType,
}

/// One detected mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanReport {
    pub id: NoteId,
    pub status: NoteStatus,
    pub note_type: NoteType,
    pub found_role: DirRole,
    pub path: PathBuf,
    /// Where the location invariant says the file belongs, when the mapping
    /// exists.
    pub expected_dir: Option<PathBuf>,
    pub kind: OrphanKind,
}

/// Per-report outcome of a repair run.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Repaired { resulting_path: PathBuf },
    WouldRepair { destination: PathBuf },
    /// Operator action required; the record cannot be mapped to a directory.
    Unsupported,
    Failed { error: String },
}

/// Aggregated result of `repair`.
#[derive(Debug, Default)]
pub struct RepairResult {
    pub outcomes: Vec<(NoteId, RepairOutcome)>,
    /// Whole-vault snapshot taken before the first repair, if any repair ran.
    pub snapshot: Option<PathBuf>,
    pub cancelled: bool,
}

impl RepairResult {
    pub fn repaired_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| {
                matches!(
                    o,
                    RepairOutcome::Repaired { .. } | RepairOutcome::WouldRepair { .. }
                )
            })
            .count()
    }
}

/// Scans tracked directories for status/location mismatches.
pub struct OrphanDetector {
    engine: Arc<PromotionEngine>,
    scanner: VaultScanner,
}

impl OrphanDetector {
    pub fn new(engine: Arc<PromotionEngine>, scanner: VaultScanner) -> Self {
        Self { engine, scanner }
    }

    /// Walk every tracked directory and report each note whose declared
    /// status disagrees with where the file physically sits.
    pub async fn scan(&self) -> Vec<OrphanReport> {
        let store = self.engine.store();
        let layout = store.layout();
        let mut reports = Vec::new();

        for scanned in self.scanner.scan() {
            let record = match store.load_at(&scanned.id, &scanned.path).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(id = %scanned.id, error = %err, "unreadable note skipped from scan");
                    continue;
                }
            };

            let expected = match layout.expected_dir(record.status, record.note_type) {
                Ok(dir) => dir.to_path_buf(),
                Err(ValidationError::UnknownType { .. }) => {
                    reports.push(OrphanReport {
                        id: scanned.id,
                        status: record.status,
                        note_type: record.note_type,
                        found_role: scanned.role,
                        path: scanned.path,
                        expected_dir: None,
                        kind: OrphanKind::UnsupportedType,
                    });
                    continue;
                }
                Err(err) => {
                    warn!(id = %scanned.id, error = %err, "unmappable note skipped from scan");
                    continue;
                }
            };

            let actual_dir = scanned.path.parent().map(PathBuf::from).unwrap_or_default();
            if actual_dir == expected {
                continue;
            }

            let kind = if record.status.is_settled() {
                OrphanKind::StatusAheadOfLocation
            } else {
                OrphanKind::LocationAheadOfStatus
            };
            reports.push(OrphanReport {
                id: scanned.id,
                status: record.status,
                note_type: record.note_type,
                found_role: scanned.role,
                path: scanned.path,
                expected_dir: Some(expected),
                kind,
            });
        }

        info!(orphans = reports.len(), "orphan scan finished");
        reports
    }

    /// Repair every reported mismatch through the promotion engine. Takes a
    /// single whole-vault snapshot before the first real repair of the run,
    /// not one backup per file.
    pub async fn repair(
        &self,
        reports: Vec<OrphanReport>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<RepairResult, EngineError> {
        let mut result = RepairResult::default();
        let store = self.engine.store();

        let needs_snapshot = !dry_run
            && reports
                .iter()
                .any(|r| r.kind != OrphanKind::UnsupportedType);
        if needs_snapshot {
            let snapshot = store.backups().snapshot_vault(store.layout()).await?;
            info!(snapshot = %snapshot.display(), "vault snapshot taken before repair");
            result.snapshot = Some(snapshot);
        }

        for report in reports {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            if report.kind == OrphanKind::UnsupportedType {
                warn!(
                    id = %report.id,
                    status = %report.status,
                    "unsupported type; operator resolution required"
                );
                result
                    .outcomes
                    .push((report.id, RepairOutcome::Unsupported));
                continue;
            }

            match self.engine.repair_one(&report.id, dry_run).await {
                Ok(outcome) => {
                    let repair_outcome = match outcome.outcome {
                        ItemOutcome::Promoted { resulting_path }
                        | ItemOutcome::NoOp { resulting_path } => RepairOutcome::Repaired {
                            resulting_path,
                        },
                        ItemOutcome::WouldPromote { destination } => RepairOutcome::WouldRepair {
                            destination,
                        },
                        ItemOutcome::Rejected { reason } => RepairOutcome::Failed {
                            error: reason.to_string(),
                        },
                    };
                    result.outcomes.push((report.id, repair_outcome));
                }
                Err(err) => {
                    warn!(id = %report.id, error = %err, "repair failed; run continues");
                    result
                        .outcomes
                        .push((report.id, RepairOutcome::Failed {
                            error: err.to_string(),
                        }));
                }
            }
        }

        Ok(result)
    }
}
