//! Vault scanning.
//!
//! Enumerates tracked note files for batch operations. Output is sorted by
//! path so repeated scans of the same vault are deterministic.

use std::path::PathBuf;
use tend_config::ScanConfig;
use tend_core::{DirRole, NoteId, VaultLayout};
use tracing::warn;
use walkdir::WalkDir;

/// One note file found during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedNote {
    pub id: NoteId,
    pub role: DirRole,
    pub path: PathBuf,
}

/// Walks the tracked directories and yields note files matching the scan
/// filters.
#[derive(Debug, Clone)]
pub struct VaultScanner {
    layout: VaultLayout,
    config: ScanConfig,
}

impl VaultScanner {
    pub fn new(layout: VaultLayout, config: ScanConfig) -> Self {
        Self { layout, config }
    }

    /// Enumerate every tracked note, sorted by path.
    pub fn scan(&self) -> Vec<ScannedNote> {
        let mut notes = Vec::new();
        for (role, dir) in self.layout.tracked_dirs() {
            if !dir.exists() {
                continue;
            }
            // Tracked directories are flat; nested directories belong to the
            // author, not the engine.
            for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                if !self.matches(&path) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                notes.push(ScannedNote {
                    id: NoteId::new(stem),
                    role,
                    path,
                });
            }
        }
        notes.sort_by(|a, b| a.path.cmp(&b.path));
        notes
    }

    fn matches(&self, path: &std::path::Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.config.include_hidden && name.starts_with('.') {
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tend_config::VaultConfig;

    async fn setup() -> (tempfile::TempDir, VaultLayout) {
        let tmp = tempfile::tempdir().unwrap();
        let config = VaultConfig::with_root(tmp.path());
        let layout = VaultLayout::from_config(&config);
        for (_, dir) in layout.tracked_dirs() {
            tokio::fs::create_dir_all(dir).await.unwrap();
        }
        (tmp, layout)
    }

    #[tokio::test]
    async fn scan_finds_notes_and_skips_non_notes() {
        let (_tmp, layout) = setup().await;
        let inbox = layout.dir_for(DirRole::Inbox);

        tokio::fs::write(inbox.join("b.md"), "").await.unwrap();
        tokio::fs::write(inbox.join("a.md"), "").await.unwrap();
        tokio::fs::write(inbox.join(".hidden.md"), "").await.unwrap();
        tokio::fs::write(inbox.join("image.png"), "").await.unwrap();
        tokio::fs::write(
            layout.dir_for(DirRole::Literature).join("c.markdown"),
            "",
        )
        .await
        .unwrap();

        let scanner = VaultScanner::new(layout, ScanConfig::default());
        let notes = scanner.scan();

        let ids: Vec<_> = notes.iter().map(|n| n.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(notes[2].role, DirRole::Literature);
    }

    #[tokio::test]
    async fn scan_is_deterministic() {
        let (_tmp, layout) = setup().await;
        let inbox = layout.dir_for(DirRole::Inbox);
        for name in ["z.md", "m.md", "a.md"] {
            tokio::fs::write(inbox.join(name), "").await.unwrap();
        }

        let scanner = VaultScanner::new(layout, ScanConfig::default());
        assert_eq!(scanner.scan(), scanner.scan());
    }
}
