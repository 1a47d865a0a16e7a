//! Note record types.
//!
//! A [`NoteRecord`] is the in-memory view of one note: the structured
//! metadata the engine owns plus the free-text body it must preserve
//! byte-for-byte. Fields the engine did not create live in `extra` and are
//! copied verbatim on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a note within the vault.
///
/// Derived from the file stem (`inbox/reading-list.md` → `reading-list`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name this note is stored under, in any tracked directory.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.0)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Declared lifecycle status of a note.
///
/// Must agree with the note's physical directory at the end of every engine
/// operation (the location invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    #[default]
    Inbox,
    Processing,
    Promoted,
    Processed,
    Failed,
}

impl NoteStatus {
    /// Statuses that live in a type-specific directory rather than the inbox.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Promoted | Self::Processed)
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inbox => "inbox",
            Self::Processing => "processing",
            Self::Promoted => "promoted",
            Self::Processed => "processed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Note type, which determines the destination directory on promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Fleeting,
    Literature,
    Permanent,
    #[default]
    Unknown,
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fleeting => "fleeting",
            Self::Literature => "literature",
            Self::Permanent => "permanent",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for NoteType {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fleeting" => Ok(Self::Fleeting),
            "literature" => Ok(Self::Literature),
            "permanent" => Ok(Self::Permanent),
            "unknown" => Ok(Self::Unknown),
            other => Err(crate::error::ValidationError::UnknownType {
                value: other.to_string(),
            }),
        }
    }
}

/// In-memory representation of one note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    pub id: NoteId,
    pub status: NoteStatus,
    pub note_type: NoteType,
    /// Quality score in `[0, 1]` produced by the scoring collaborator.
    /// `None` means "not yet scored" and never passes a promotion check.
    pub quality_score: Option<f64>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Metadata fields the engine did not create. Preserved unchanged across
    /// every operation; never parsed into typed fields.
    pub extra: BTreeMap<String, serde_yaml::Value>,
    /// Free-text body. Opaque to the engine.
    pub body: String,
}

impl NoteRecord {
    /// Create a freshly captured note: `inbox` status, unknown type, no score.
    pub fn new(id: NoteId, body: impl Into<String>) -> Self {
        Self {
            id,
            status: NoteStatus::default(),
            note_type: NoteType::default(),
            quality_score: None,
            tags: Vec::new(),
            created_at: Some(Utc::now()),
            promoted_at: None,
            processed_at: None,
            extra: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Effective score for threshold filtering. Missing scores count as 0.0.
    pub fn effective_score(&self) -> f64 {
        self.quality_score.unwrap_or(0.0)
    }

    /// Set `promoted_at` if it has never been set. Timestamps are monotonic:
    /// once recorded they are never rewritten to an earlier value.
    pub fn mark_promoted_at(&mut self, now: DateTime<Utc>) {
        if self.promoted_at.is_none() {
            self.promoted_at = Some(now);
        }
    }

    /// Set `processed_at` if it has never been set.
    pub fn mark_processed_at(&mut self, now: DateTime<Utc>) {
        if self.processed_at.is_none() {
            self.processed_at = Some(now);
        }
    }
}
