//! Backup area.
//!
//! Timestamped copies taken before every destructive step, written outside
//! the tracked directories so neither the watcher nor the orphan scan ever
//! sees them. Backups are retained for operator-controlled cleanup; nothing
//! here deletes them.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tend_core::{StorageResult, VaultLayout};
use tracing::debug;

/// Handle on the vault's backup directory.
#[derive(Debug, Clone)]
pub struct BackupArea {
    dir: PathBuf,
}

impl BackupArea {
    pub fn new(layout: &VaultLayout) -> Self {
        Self {
            dir: layout.backups().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy one file into the backup area. Returns the backup path.
    pub async fn backup_file(&self, path: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let target = self.dir.join(format!("{}-{}", timestamp(), name));

        tokio::fs::copy(path, &target).await?;
        debug!(source = %path.display(), backup = %target.display(), "backed up note");
        Ok(target)
    }

    /// Copy every tracked directory into one timestamped snapshot. Taken
    /// once before the first repair of an orphan run, not per file.
    pub async fn snapshot_vault(&self, layout: &VaultLayout) -> StorageResult<PathBuf> {
        let snapshot = self.dir.join(format!("snapshot-{}", timestamp()));
        tokio::fs::create_dir_all(&snapshot).await?;

        for (role, dir) in layout.tracked_dirs() {
            if !dir.exists() {
                continue;
            }
            let target_dir = snapshot.join(dir.file_name().unwrap_or_default());
            tokio::fs::create_dir_all(&target_dir).await?;

            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_file() {
                    let target = target_dir.join(entry.file_name());
                    tokio::fs::copy(&path, &target).await?;
                }
            }
            debug!(?role, snapshot = %snapshot.display(), "snapshotted tracked directory");
        }
        Ok(snapshot)
    }
}

/// Filesystem-safe UTC timestamp with sub-second precision, so rapid
/// successive backups of the same file do not collide.
fn timestamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tend_config::VaultConfig;

    fn setup() -> (tempfile::TempDir, VaultLayout) {
        let tmp = tempfile::tempdir().unwrap();
        let config = VaultConfig::with_root(tmp.path());
        let layout = VaultLayout::from_config(&config);
        (tmp, layout)
    }

    #[tokio::test]
    async fn backup_copies_without_touching_source() {
        let (tmp, layout) = setup();
        let area = BackupArea::new(&layout);

        let source = tmp.path().join("note.md");
        tokio::fs::write(&source, "content").await.unwrap();

        let backup = area.backup_file(&source).await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&backup).await.unwrap(), "content");
        assert_eq!(tokio::fs::read_to_string(&source).await.unwrap(), "content");
        assert!(backup.starts_with(layout.backups()));
    }

    #[tokio::test]
    async fn snapshot_covers_all_tracked_dirs() {
        let (_tmp, layout) = setup();
        let area = BackupArea::new(&layout);

        for (_, dir) in layout.tracked_dirs() {
            tokio::fs::create_dir_all(dir).await.unwrap();
        }
        tokio::fs::write(
            layout.dir_for(tend_core::DirRole::Inbox).join("a.md"),
            "in inbox",
        )
        .await
        .unwrap();
        tokio::fs::write(
            layout.dir_for(tend_core::DirRole::Literature).join("b.md"),
            "in literature",
        )
        .await
        .unwrap();

        let snapshot = area.snapshot_vault(&layout).await.unwrap();

        assert!(snapshot.join("inbox").join("a.md").exists());
        assert!(snapshot.join("literature").join("b.md").exists());
    }
}
