//! Atomic file store.
//!
//! [`AtomicFileStore::apply`] is the only sanctioned way to mutate a tracked
//! note file. Every operation follows backup → stage → rename, so a failure
//! at any step leaves the original file untouched and the location invariant
//! intact. The store never retries; its contract stays simple and every
//! failure is auditable by the caller.

use crate::backup::BackupArea;
use crate::locks::{NoteLocks, NoteWriteGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tend_core::{
    DirRole, NoteDocument, NoteId, NoteRecord, StorageError, StorageResult, VaultLayout,
};
use tracing::{debug, warn};

/// A mutation of the vault's tracked files.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Rewrite a note's metadata header in place.
    WriteMetadata { record: NoteRecord, path: PathBuf },

    /// Move a note file without touching its content.
    Relocate {
        id: NoteId,
        from: PathBuf,
        to: PathBuf,
    },

    /// Update metadata and relocate as one unit. This is the only sanctioned
    /// way to change both status and location.
    CombinedRelocateAndUpdate {
        record: NoteRecord,
        from: PathBuf,
        to: PathBuf,
    },
}

impl StoreOperation {
    fn note_id(&self) -> &NoteId {
        match self {
            Self::WriteMetadata { record, .. } => &record.id,
            Self::Relocate { id, .. } => id,
            Self::CombinedRelocateAndUpdate { record, .. } => &record.id,
        }
    }
}

/// Successful outcome of a store operation.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    /// Where the note file now lives.
    pub resulting_path: PathBuf,
    /// Backup taken before the mutation.
    pub backup_path: PathBuf,
}

/// The single writer for tracked note files.
pub struct AtomicFileStore {
    layout: Arc<VaultLayout>,
    backups: BackupArea,
    locks: NoteLocks,
}

impl AtomicFileStore {
    pub fn new(layout: Arc<VaultLayout>) -> Self {
        let backups = BackupArea::new(&layout);
        Self {
            layout,
            backups,
            locks: NoteLocks::new(),
        }
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    pub fn backups(&self) -> &BackupArea {
        &self.backups
    }

    /// Find which tracked directory currently holds the note, if any.
    pub fn locate(&self, id: &NoteId) -> Option<(DirRole, PathBuf)> {
        for (role, dir) in self.layout.tracked_dirs() {
            let path = dir.join(id.file_name());
            if path.is_file() {
                return Some((role, path));
            }
        }
        None
    }

    /// Read and parse a note by id.
    pub async fn load(&self, id: &NoteId) -> StorageResult<(NoteRecord, DirRole, PathBuf)> {
        let (role, path) = self
            .locate(id)
            .ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
        let record = self.load_at(id, &path).await?;
        Ok((record, role, path))
    }

    /// Read and parse a note at a known path.
    pub async fn load_at(&self, id: &NoteId, path: &Path) -> StorageResult<NoteRecord> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StorageError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        NoteDocument::parse(id.clone(), &content).map_err(|err| StorageError::Document {
            id: id.clone(),
            reason: err.to_string(),
        })
    }

    /// Acquire the single-writer lock for one note. Callers that read a
    /// note, decide, and then write must hold this across the whole
    /// sequence and apply through [`AtomicFileStore::apply_locked`], so a
    /// concurrent caller observes the settled state rather than racing the
    /// file move.
    pub async fn lock_note(&self, id: &NoteId) -> NoteWriteGuard {
        self.locks.acquire(id).await
    }

    /// Apply one mutation under the note's write lock.
    pub async fn apply(&self, operation: StoreOperation) -> StorageResult<StoreOutcome> {
        let guard = self.lock_note(operation.note_id()).await;
        self.apply_locked(&guard, operation).await
    }

    /// Apply one mutation under a write guard the caller already holds.
    pub async fn apply_locked(
        &self,
        guard: &NoteWriteGuard,
        operation: StoreOperation,
    ) -> StorageResult<StoreOutcome> {
        debug_assert_eq!(guard.id(), operation.note_id());

        match operation {
            StoreOperation::WriteMetadata { record, path } => {
                self.write_in_place(&record, &path).await
            }
            StoreOperation::Relocate { id, from, to } => self.relocate(&id, &from, &to).await,
            StoreOperation::CombinedRelocateAndUpdate { record, from, to } => {
                self.relocate_and_update(&record, &from, &to).await
            }
        }
    }

    /// backup → stage → rename over the original path.
    async fn write_in_place(
        &self,
        record: &NoteRecord,
        path: &Path,
    ) -> StorageResult<StoreOutcome> {
        let id = &record.id;
        let backup_path = self
            .backups
            .backup_file(path)
            .await
            .map_err(|source| StorageError::BackupFailed {
                id: id.clone(),
                source,
            })?;

        let staged = self.stage(record).await?;

        if let Err(source) = tokio::fs::rename(&staged, path).await {
            self.discard_staged(&staged).await;
            return Err(StorageError::MoveFailed {
                id: id.clone(),
                from: staged,
                to: path.to_path_buf(),
                source,
            });
        }

        debug!(id = %id, path = %path.display(), "rewrote metadata");
        Ok(StoreOutcome {
            resulting_path: path.to_path_buf(),
            backup_path,
        })
    }

    /// backup → rename. Content untouched.
    async fn relocate(&self, id: &NoteId, from: &Path, to: &Path) -> StorageResult<StoreOutcome> {
        let backup_path = self
            .backups
            .backup_file(from)
            .await
            .map_err(|source| StorageError::BackupFailed {
                id: id.clone(),
                source,
            })?;

        self.prepare_destination(id, to).await?;

        tokio::fs::rename(from, to)
            .await
            .map_err(|source| StorageError::MoveFailed {
                id: id.clone(),
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;

        debug!(id = %id, from = %from.display(), to = %to.display(), "relocated note");
        Ok(StoreOutcome {
            resulting_path: to.to_path_buf(),
            backup_path,
        })
    }

    /// backup → stage updated content → rename into destination → delete
    /// source. Any failure before the source delete leaves the source file
    /// exactly as it was; a failed source delete rolls the destination back.
    async fn relocate_and_update(
        &self,
        record: &NoteRecord,
        from: &Path,
        to: &Path,
    ) -> StorageResult<StoreOutcome> {
        let id = &record.id;

        if from == to {
            return self.write_in_place(record, from).await;
        }

        let backup_path = self
            .backups
            .backup_file(from)
            .await
            .map_err(|source| StorageError::BackupFailed {
                id: id.clone(),
                source,
            })?;

        self.prepare_destination(id, to).await?;
        let staged = self.stage(record).await?;

        if let Err(source) = tokio::fs::rename(&staged, to).await {
            self.discard_staged(&staged).await;
            return Err(StorageError::MoveFailed {
                id: id.clone(),
                from: staged,
                to: to.to_path_buf(),
                source,
            });
        }

        if let Err(source) = tokio::fs::remove_file(from).await {
            // Destination landed but the source would linger as a duplicate.
            // Roll the destination back; the source file is still the truth.
            if let Err(rollback) = tokio::fs::remove_file(to).await {
                warn!(
                    id = %id,
                    to = %to.display(),
                    error = %rollback,
                    "rollback of destination failed; restore from backup required"
                );
            }
            return Err(StorageError::MoveFailed {
                id: id.clone(),
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            });
        }

        debug!(
            id = %id,
            from = %from.display(),
            to = %to.display(),
            status = %record.status,
            "relocated note with metadata update"
        );
        Ok(StoreOutcome {
            resulting_path: to.to_path_buf(),
            backup_path,
        })
    }

    /// Render the record into the staging area and return the staged path.
    async fn stage(&self, record: &NoteRecord) -> StorageResult<PathBuf> {
        let id = &record.id;
        let content = NoteDocument::render(record).map_err(|err| StorageError::Document {
            id: id.clone(),
            reason: err.to_string(),
        })?;

        let staging = self.layout.staging();
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|source| StorageError::WriteFailed {
                id: id.clone(),
                source,
            })?;

        let staged = staging.join(format!(
            "{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%6f"),
            id.file_name()
        ));
        tokio::fs::write(&staged, content)
            .await
            .map_err(|source| StorageError::WriteFailed {
                id: id.clone(),
                source,
            })?;
        Ok(staged)
    }

    async fn discard_staged(&self, staged: &Path) {
        if let Err(err) = tokio::fs::remove_file(staged).await {
            warn!(path = %staged.display(), error = %err, "failed to clean up staged file");
        }
    }

    /// Back up an existing destination before it gets overwritten, and make
    /// sure the destination directory exists.
    async fn prepare_destination(&self, id: &NoteId, to: &Path) -> StorageResult<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::WriteFailed {
                    id: id.clone(),
                    source,
                })?;
        }
        if to.is_file() {
            self.backups
                .backup_file(to)
                .await
                .map_err(|source| StorageError::BackupFailed {
                    id: id.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tend_config::VaultConfig;
    use tend_core::{NoteStatus, NoteType};

    async fn setup() -> (tempfile::TempDir, Arc<VaultLayout>, AtomicFileStore) {
        let tmp = tempfile::tempdir().unwrap();
        let config = VaultConfig::with_root(tmp.path());
        let layout = Arc::new(VaultLayout::from_config(&config));
        for (_, dir) in layout.tracked_dirs() {
            tokio::fs::create_dir_all(dir).await.unwrap();
        }
        let store = AtomicFileStore::new(Arc::clone(&layout));
        (tmp, layout, store)
    }

    async fn seed_inbox(layout: &VaultLayout, id: &str, content: &str) -> PathBuf {
        let path = layout.note_path(DirRole::Inbox, &NoteId::from(id));
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    const SCORED: &str = "---\nstatus: inbox\ntype: literature\nquality_score: 0.9\nsource_url: https://example.org\n---\nbody\n";

    #[tokio::test]
    async fn combined_moves_and_updates_as_one_unit() {
        let (_tmp, layout, store) = setup().await;
        let from = seed_inbox(&layout, "n1", SCORED).await;

        let id = NoteId::from("n1");
        let mut record = store.load_at(&id, &from).await.unwrap();
        record.status = NoteStatus::Promoted;
        let to = layout.note_path(DirRole::Literature, &id);

        let outcome = store
            .apply(StoreOperation::CombinedRelocateAndUpdate {
                record,
                from: from.clone(),
                to: to.clone(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.resulting_path, to);
        assert!(!from.exists(), "source must be gone after the move");

        let moved = store.load_at(&id, &to).await.unwrap();
        assert_eq!(moved.status, NoteStatus::Promoted);
        assert_eq!(moved.note_type, NoteType::Literature);
        assert_eq!(moved.body, "body\n");
        // Fields the engine does not own survive the rewrite.
        assert!(moved.extra.contains_key("source_url"));
    }

    #[tokio::test]
    async fn failed_move_leaves_source_untouched() {
        let (_tmp, layout, store) = setup().await;
        let from = seed_inbox(&layout, "n1", SCORED).await;

        let id = NoteId::from("n1");
        let mut record = store.load_at(&id, &from).await.unwrap();
        record.status = NoteStatus::Promoted;

        // Occupy the destination path with a directory so the rename fails
        // after the staged write succeeded.
        let to = layout.note_path(DirRole::Literature, &id);
        tokio::fs::create_dir_all(&to).await.unwrap();

        let err = store
            .apply(StoreOperation::CombinedRelocateAndUpdate {
                record,
                from: from.clone(),
                to: to.clone(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::MoveFailed { .. }));
        assert_eq!(
            tokio::fs::read_to_string(&from).await.unwrap(),
            SCORED,
            "source content must be byte-identical after a failed move"
        );
        // Nothing staged left behind.
        let mut staged = tokio::fs::read_dir(layout.staging()).await.unwrap();
        assert!(staged.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn every_mutation_takes_a_backup_first() {
        let (_tmp, layout, store) = setup().await;
        let path = seed_inbox(&layout, "n1", SCORED).await;

        let id = NoteId::from("n1");
        let mut record = store.load_at(&id, &path).await.unwrap();
        record.quality_score = Some(0.95);

        let outcome = store
            .apply(StoreOperation::WriteMetadata {
                record,
                path: path.clone(),
            })
            .await
            .unwrap();

        let backed_up = tokio::fs::read_to_string(&outcome.backup_path)
            .await
            .unwrap();
        assert_eq!(backed_up, SCORED, "backup holds the pre-mutation content");

        let rewritten = store.load_at(&id, &path).await.unwrap();
        assert_eq!(rewritten.quality_score, Some(0.95));
    }

    #[tokio::test]
    async fn relocate_preserves_content_bytes() {
        let (_tmp, layout, store) = setup().await;
        let from = seed_inbox(&layout, "n1", SCORED).await;
        let id = NoteId::from("n1");
        let to = layout.note_path(DirRole::Fleeting, &id);

        store
            .apply(StoreOperation::Relocate {
                id,
                from: from.clone(),
                to: to.clone(),
            })
            .await
            .unwrap();

        assert!(!from.exists());
        assert_eq!(tokio::fs::read_to_string(&to).await.unwrap(), SCORED);
    }

    #[tokio::test]
    async fn locate_finds_notes_across_tracked_dirs() {
        let (_tmp, layout, store) = setup().await;
        let id = NoteId::from("n1");
        let path = layout.note_path(DirRole::Permanent, &id);
        tokio::fs::write(&path, SCORED).await.unwrap();

        let (role, found) = store.locate(&id).unwrap();
        assert_eq!(role, DirRole::Permanent);
        assert_eq!(found, path);

        assert!(store.locate(&NoteId::from("missing")).is_none());
    }
}
