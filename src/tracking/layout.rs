//! Fixed layout of a managed root.
//!
//! ```text
//! <root>/
//!   monitoring.json | backup.json     registry
//!   monitoring.json.lock | ...        registry write lock
//!   orphanage/                        quarantine
//!   <artifact>...                     one per registered target
//! ```

use crate::tracking::artifacts::{slice_dir_name, suffix_of};
use crate::tracking::registry::TargetEntry;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the quarantine directory inside every managed root
pub const ORPHANAGE_DIR: &str = "orphanage";

/// Which of the two engines a root, registry or process belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Audit-log engine
    Monitoring,
    /// Versioned-copy engine
    Backup,
}

impl EngineKind {
    /// Lowercase engine name, used in file names and config sections
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Backup => "backup",
        }
    }

    /// Registry file name inside the managed root
    #[must_use]
    pub const fn registry_file_name(self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring.json",
            Self::Backup => "backup.json",
        }
    }

    /// Autostart lock file name inside the state directory
    #[must_use]
    pub const fn lock_file_name(self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring.lock",
            Self::Backup => "backup.lock",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths of one engine's managed root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Engine owning the root
    kind: EngineKind,
    /// Managed root directory
    root: PathBuf,
}

impl Layout {
    /// Create a layout for `root`; nothing is touched on disk
    #[must_use]
    pub const fn new(kind: EngineKind, root: PathBuf) -> Self {
        Self { kind, root }
    }

    /// Engine owning this root
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Managed root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// JSON registry file
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(self.kind.registry_file_name())
    }

    /// Advisory lock guarding registry rewrites
    #[must_use]
    pub fn registry_lock_path(&self) -> PathBuf {
        self.root
            .join(format!("{}.lock", self.kind.registry_file_name()))
    }

    /// Quarantine directory
    #[must_use]
    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(ORPHANAGE_DIR)
    }

    /// Whether a direct child of the root belongs to the root itself rather
    /// than to a target
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        name == ORPHANAGE_DIR
            || name == self.kind.registry_file_name()
            || name == format!("{}.lock", self.kind.registry_file_name())
    }

    /// Artifact of a whole target: its log file or its backup directory
    #[must_use]
    pub fn target_artifact(&self, entry: &TargetEntry) -> PathBuf {
        self.root.join(&entry.artifact_name)
    }

    /// Artifact receiving the output for one concrete file of a target.
    ///
    /// Every file of a monitored directory shares the target's log; each
    /// file of a backed-up directory gets its own slice directory.
    #[must_use]
    pub fn file_artifact(&self, entry: &TargetEntry, file: &Path) -> PathBuf {
        let artifact = self.target_artifact(entry);
        match self.kind {
            EngineKind::Backup if entry.is_directory => {
                artifact.join(slice_dir_name(file, suffix_of(&entry.artifact_name)))
            }
            _ => artifact,
        }
    }

    /// Create the root and its quarantine directory
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created
    pub fn ensure_exists(&self) -> Result<()> {
        let quarantine = self.quarantine_dir();
        std::fs::create_dir_all(&quarantine)
            .with_context(|| format!("Failed to create {}", quarantine.display()))
    }
}
