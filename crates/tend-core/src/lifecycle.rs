//! Lifecycle state machine.
//!
//! Pure decision logic: given a note's current status, an event, and a
//! [`TransitionContext`], compute the next status or reject with a reason
//! code. No I/O happens here; the engine applies accepted transitions through
//! the atomic file store.
//!
//! Transition table (initial state `inbox`):
//!
//! | From       | Event                 | To          | Guard                                |
//! |------------|-----------------------|-------------|--------------------------------------|
//! | inbox      | begin_processing      | processing  | none                                 |
//! | processing | begin_processing      | processing  | re-entry after an interrupted run    |
//! | processing | enrichment_failed     | failed      | none                                 |
//! | processing | enrichment_succeeded  | inbox       | score recorded                       |
//! | inbox      | promote               | promoted    | score >= threshold and known type    |
//! | promoted   | mark_processed        | processed   | none                                 |
//! | failed     | retry                 | processing  | attempt_count < max_attempts         |
//! | *          | repair                | recomputed  | from physical location, detector only|

use crate::layout::DirRole;
use crate::types::{NoteStatus, NoteType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events that drive lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    BeginProcessing,
    EnrichmentFailed,
    EnrichmentSucceeded,
    Promote,
    MarkProcessed,
    Retry,
    /// Recompute status from physical location. Issued only by the orphan
    /// detector.
    Repair,
}

/// Why a transition was rejected. A rejection is a normal outcome, not an
/// error path; callers surface the reason instead of swallowing it.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    #[error("quality score {score} below threshold {threshold}")]
    BelowThreshold { score: f64, threshold: f64 },

    #[error("note type is unknown; no destination directory")]
    UnknownType,

    #[error("note is in a terminal state")]
    AlreadyTerminal,

    #[error("retry attempts exhausted ({attempts}/{max_attempts})")]
    RetryExhausted { attempts: u32, max_attempts: u32 },

    #[error("no quality score recorded")]
    ScoreNotRecorded,

    #[error("event {event:?} does not apply in state {from}")]
    InvalidTransition {
        from: NoteStatus,
        event: LifecycleEvent,
    },
}

/// Inputs the guards need beyond the current status.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub quality_score: Option<f64>,
    pub threshold: f64,
    pub note_type: NoteType,
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Where the file physically resides; consulted only by `Repair`.
    pub physical_role: Option<DirRole>,
}

impl TransitionContext {
    pub fn new(note_type: NoteType) -> Self {
        Self {
            quality_score: None,
            threshold: 0.7,
            note_type,
            attempt_count: 0,
            max_attempts: 3,
            physical_role: None,
        }
    }

    pub fn with_score(mut self, score: Option<f64>) -> Self {
        self.quality_score = score;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_attempts(mut self, attempts: u32, max_attempts: u32) -> Self {
        self.attempt_count = attempts;
        self.max_attempts = max_attempts;
        self
    }

    pub fn at_location(mut self, role: DirRole) -> Self {
        self.physical_role = Some(role);
        self
    }
}

/// Compute the next status for `event`, or reject.
pub fn next_state(
    current: NoteStatus,
    event: LifecycleEvent,
    ctx: &TransitionContext,
) -> Result<NoteStatus, RejectReason> {
    use LifecycleEvent as E;
    use NoteStatus as S;

    if event == E::Repair {
        return repair_state(current, ctx);
    }

    // Processed is terminal for every event except repair.
    if current == S::Processed {
        return Err(RejectReason::AlreadyTerminal);
    }

    match (current, event) {
        (S::Inbox, E::BeginProcessing) => Ok(S::Processing),
        // A processing status with no run behind it is stale (the run was
        // interrupted); the event re-enters processing instead of wedging
        // the note.
        (S::Processing, E::BeginProcessing) => Ok(S::Processing),
        (S::Processing, E::EnrichmentFailed) => Ok(S::Failed),
        (S::Processing, E::EnrichmentSucceeded) => {
            if ctx.quality_score.is_some() {
                Ok(S::Inbox)
            } else {
                Err(RejectReason::ScoreNotRecorded)
            }
        }
        (S::Inbox, E::Promote) => {
            if ctx.note_type == NoteType::Unknown {
                return Err(RejectReason::UnknownType);
            }
            // Inclusive threshold; a missing score counts as 0.0 but a note
            // that was never scored is not promotable even at threshold 0.0.
            let Some(score) = ctx.quality_score else {
                return Err(RejectReason::BelowThreshold {
                    score: 0.0,
                    threshold: ctx.threshold,
                });
            };
            if score >= ctx.threshold {
                Ok(S::Promoted)
            } else {
                Err(RejectReason::BelowThreshold {
                    score,
                    threshold: ctx.threshold,
                })
            }
        }
        (S::Promoted, E::MarkProcessed) => Ok(S::Processed),
        (S::Failed, E::Retry) => {
            if ctx.attempt_count < ctx.max_attempts {
                Ok(S::Processing)
            } else {
                Err(RejectReason::RetryExhausted {
                    attempts: ctx.attempt_count,
                    max_attempts: ctx.max_attempts,
                })
            }
        }
        (from, event) => Err(RejectReason::InvalidTransition { from, event }),
    }
}

/// Status implied by the note's physical location.
fn repair_state(current: NoteStatus, ctx: &TransitionContext) -> Result<NoteStatus, RejectReason> {
    match ctx.physical_role {
        Some(DirRole::Fleeting) | Some(DirRole::Literature) | Some(DirRole::Permanent) => {
            // A file in a type directory is at least promoted; a processed
            // note that is where it belongs stays processed.
            if current == NoteStatus::Processed {
                Ok(NoteStatus::Processed)
            } else {
                Ok(NoteStatus::Promoted)
            }
        }
        Some(DirRole::Inbox) => {
            if current.is_settled() {
                Ok(NoteStatus::Inbox)
            } else {
                Ok(current)
            }
        }
        Some(DirRole::Archive) | None => Err(RejectReason::InvalidTransition {
            from: current,
            event: LifecycleEvent::Repair,
        }),
    }
}
