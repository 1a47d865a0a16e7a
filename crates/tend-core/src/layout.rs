//! Vault directory layout.
//!
//! [`VaultLayout`] is the single source of truth for where notes live. It is
//! built once from configuration at startup and passed explicitly to every
//! component; nothing else is allowed to hardcode vault paths.

use crate::error::ValidationError;
use crate::types::{NoteId, NoteStatus, NoteType};
use std::path::{Path, PathBuf};
use tend_config::VaultConfig;

/// Logical role of a tracked directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirRole {
    Inbox,
    Fleeting,
    Literature,
    Permanent,
    Archive,
}

impl DirRole {
    /// The role a note of this type settles into when promoted.
    pub fn for_type(note_type: NoteType) -> Result<Self, ValidationError> {
        match note_type {
            NoteType::Fleeting => Ok(Self::Fleeting),
            NoteType::Literature => Ok(Self::Literature),
            NoteType::Permanent => Ok(Self::Permanent),
            NoteType::Unknown => Err(ValidationError::UnknownType {
                value: note_type.to_string(),
            }),
        }
    }
}

/// Immutable mapping from directory roles to physical locations under a
/// single vault root.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
    inbox: PathBuf,
    fleeting: PathBuf,
    literature: PathBuf,
    permanent: PathBuf,
    archive: PathBuf,
    backups: PathBuf,
    staging: PathBuf,
}

impl VaultLayout {
    /// Build the layout from loaded configuration.
    pub fn from_config(config: &VaultConfig) -> Self {
        let root = config.root.clone();
        let dirs = &config.directories;
        Self {
            inbox: root.join(&dirs.inbox),
            fleeting: root.join(&dirs.fleeting),
            literature: root.join(&dirs.literature),
            permanent: root.join(&dirs.permanent),
            archive: root.join(&dirs.archive),
            backups: root.join(".tend").join("backups"),
            staging: root.join(".tend").join("staging"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backup area. Outside the tracked directories so the watcher and the
    /// orphan scan never see backup copies.
    pub fn backups(&self) -> &Path {
        &self.backups
    }

    /// Staging area for in-flight writes, on the same filesystem as the
    /// tracked directories so a staged file can be renamed into place.
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn dir_for(&self, role: DirRole) -> &Path {
        match role {
            DirRole::Inbox => &self.inbox,
            DirRole::Fleeting => &self.fleeting,
            DirRole::Literature => &self.literature,
            DirRole::Permanent => &self.permanent,
            DirRole::Archive => &self.archive,
        }
    }

    /// The directory a note of this type lives in once promoted.
    pub fn type_dir(&self, note_type: NoteType) -> Result<&Path, ValidationError> {
        Ok(self.dir_for(DirRole::for_type(note_type)?))
    }

    /// The directory the location invariant requires for a given status/type
    /// pair: type directory for settled notes, inbox for everything else.
    pub fn expected_dir(
        &self,
        status: NoteStatus,
        note_type: NoteType,
    ) -> Result<&Path, ValidationError> {
        if status.is_settled() {
            self.type_dir(note_type)
        } else {
            Ok(&self.inbox)
        }
    }

    /// Directories the engine tracks: the inbox plus the three type
    /// directories. The archive is resolvable but never scanned; archival is
    /// an external operation.
    pub fn tracked_dirs(&self) -> [(DirRole, &Path); 4] {
        [
            (DirRole::Inbox, self.inbox.as_path()),
            (DirRole::Fleeting, self.fleeting.as_path()),
            (DirRole::Literature, self.literature.as_path()),
            (DirRole::Permanent, self.permanent.as_path()),
        ]
    }

    /// Which tracked role a path falls under, if any.
    pub fn role_of(&self, path: &Path) -> Option<DirRole> {
        let parent = path.parent()?;
        self.tracked_dirs()
            .into_iter()
            .find(|(_, dir)| parent == *dir)
            .map(|(role, _)| role)
    }

    /// Physical path of a note when stored under the given role.
    pub fn note_path(&self, role: DirRole, id: &NoteId) -> PathBuf {
        self.dir_for(role).join(id.file_name())
    }
}
