//! Per-cycle metadata snapshot.
//!
//! The snapshot maps every concrete watched file to the timestamps it had
//! when the snapshot was built and to the artifact its changes go to. It is
//! derived from the registry and the live filesystem and never persisted.

use crate::tracking::artifacts::{direct_child_files, seed_backup};
use crate::tracking::layout::{EngineKind, Layout};
use crate::tracking::registry::{TargetEntry, TargetRegistry};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Normalized absolute path of a watched file, used as the snapshot key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackedPath(PathBuf);

impl TrackedPath {
    /// Normalize `path` by dropping `.` components and trailing separators
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self(
            path.components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect(),
        )
    }

    /// The normalized path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for TrackedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Modification and access time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    /// Last content modification
    pub modified: SystemTime,
    /// Last access; equals `modified` on filesystems without atime
    pub accessed: SystemTime,
}

impl FileTimes {
    /// Extract both times from file metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the platform reports no modification time
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        let modified = metadata.modified()?;
        let accessed = metadata.accessed().unwrap_or(modified);
        Ok(Self { modified, accessed })
    }

    /// Read both times of the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed
    pub fn read(path: &Path) -> std::io::Result<Self> {
        Self::from_metadata(&std::fs::metadata(path)?)
    }
}

/// Last-known state of one watched file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Registry id of the owning target
    pub target_id: u64,
    /// Last observed modification time
    pub modified_at: SystemTime,
    /// Last observed access time, tracked by the monitoring engine only
    pub accessed_at: Option<SystemTime>,
    /// Log file or backup directory receiving this file's output
    pub artifact_path: PathBuf,
    /// Directory target containing the file, if any
    pub parent_dir_path: Option<PathBuf>,
    /// Whether the file was discovered through a directory target
    pub as_directory: bool,
}

/// All watched files of one engine as of the last build
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Records keyed by normalized path
    records: BTreeMap<TrackedPath, MetadataRecord>,
    /// Directory targets whose children were listed in this build
    expanded: BTreeSet<u64>,
}

impl Snapshot {
    /// Build a snapshot from the registry and the live filesystem.
    ///
    /// Targets whose path no longer exists are removed from the registry.
    /// The backup engine also seeds any per-file backup directory that does
    /// not exist yet with one initial copy.
    ///
    /// # Errors
    ///
    /// Returns an error only if the registry cannot be rewritten; per-file
    /// problems are logged and skipped
    pub fn build(layout: &Layout, registry: &mut TargetRegistry) -> Result<Self> {
        let mut records = BTreeMap::new();
        let mut expanded = BTreeSet::new();
        let mut lost = Vec::new();

        for (id, entry) in registry.iter() {
            if !entry.path.exists() {
                lost.push(id);
                continue;
            }

            if entry.path.is_dir() != entry.is_directory {
                tracing::warn!(
                    id,
                    path = %entry.path.display(),
                    "target changed type since registration, skipping"
                );
                continue;
            }

            if entry.is_directory {
                let files = match direct_child_files(&entry.path) {
                    Ok(files) => files,
                    Err(e) => {
                        tracing::warn!(id, path = %entry.path.display(), "cannot list directory target: {e:#}");
                        continue;
                    }
                };
                expanded.insert(id);
                for file in files {
                    if let Some(record) = build_record(layout, id, entry, &file) {
                        records.insert(TrackedPath::new(&file), record);
                    }
                }
            } else if let Some(record) = build_record(layout, id, entry, &entry.path) {
                records.insert(TrackedPath::new(&entry.path), record);
            }
        }

        for (id, entry) in registry.remove_all(&lost)? {
            tracing::info!(id, path = %entry.path.display(), "target no longer exists, dropped from registry");
        }

        Ok(Self { records, expanded })
    }

    /// Whether directory target `id` was listed in this build. A skipped
    /// target (unreadable, or no longer a directory) has no say over which
    /// slices of its artifact are current.
    #[must_use]
    pub fn expanded(&self, id: u64) -> bool {
        self.expanded.contains(&id)
    }

    /// Record for a path
    #[must_use]
    pub fn get(&self, path: &TrackedPath) -> Option<&MetadataRecord> {
        self.records.get(path)
    }

    /// Mutable record for a path
    pub fn get_mut(&mut self, path: &TrackedPath) -> Option<&mut MetadataRecord> {
        self.records.get_mut(path)
    }

    /// Records in path order
    pub fn iter(&self) -> impl Iterator<Item = (&TrackedPath, &MetadataRecord)> {
        self.records.iter()
    }

    /// Watched paths in order
    #[must_use]
    pub fn paths(&self) -> Vec<TrackedPath> {
        self.records.keys().cloned().collect()
    }

    /// Number of watched files
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is watched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stat one watched file and derive its record
fn build_record(
    layout: &Layout,
    id: u64,
    entry: &TargetEntry,
    file: &Path,
) -> Option<MetadataRecord> {
    let times = match FileTimes::read(file) {
        Ok(times) => times,
        Err(e) => {
            tracing::debug!(path = %file.display(), "skipping unreadable file: {e}");
            return None;
        }
    };

    let artifact_path = layout.file_artifact(entry, file);
    if layout.kind() == EngineKind::Backup && !artifact_path.exists() {
        match seed_backup(file, &artifact_path) {
            Ok(copy) => tracing::info!(copy = %copy.display(), "seeded backup"),
            Err(e) => tracing::warn!(path = %file.display(), "failed to seed backup: {e:#}"),
        }
    }

    Some(MetadataRecord {
        target_id: id,
        modified_at: times.modified,
        accessed_at: match layout.kind() {
            EngineKind::Monitoring => Some(times.accessed),
            EngineKind::Backup => None,
        },
        artifact_path,
        parent_dir_path: entry.is_directory.then(|| entry.path.clone()),
        as_directory: entry.is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_tracked_path_normalizes() {
        assert_eq!(
            TrackedPath::new(Path::new("/a/./b/")),
            TrackedPath::new(Path::new("/a/b"))
        );
    }

    #[test]
    fn test_directory_target_is_not_recursive() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("docs");
        fs::create_dir_all(dir.join("sub"))?;
        fs::write(dir.join("a.txt"), "a")?;
        fs::write(dir.join("sub/b.txt"), "b")?;

        let layout = Layout::new(EngineKind::Monitoring, temp.path().join("root"));
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)?;
        let (id, _) = registry.register(&dir, "tester")?;

        let snapshot = Snapshot::build(&layout, &mut registry)?;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.expanded(id));

        let canonical = dir.canonicalize()?;
        let record = snapshot
            .get(&TrackedPath::new(&canonical.join("a.txt")))
            .ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert!(record.as_directory);
        assert_eq!(record.parent_dir_path.as_deref(), Some(canonical.as_path()));
        assert!(record.accessed_at.is_some());
        Ok(())
    }

    #[test]
    fn test_missing_target_is_dropped_from_registry() -> Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "a")?;

        let layout = Layout::new(EngineKind::Backup, temp.path().join("root"));
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)?;
        registry.register(&file, "tester")?;
        fs::remove_file(&file)?;

        let snapshot = Snapshot::build(&layout, &mut registry)?;
        assert!(snapshot.is_empty());
        assert!(registry.is_empty());
        registry.reload()?;
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn test_backup_seeds_new_files_in_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("docs");
        fs::create_dir_all(&dir)?;

        let layout = Layout::new(EngineKind::Backup, temp.path().join("root"));
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)?;
        let (_, entry) = registry.register(&dir, "tester")?;

        fs::write(dir.join("late.txt"), "arrived later")?;
        let snapshot = Snapshot::build(&layout, &mut registry)?;

        let record = snapshot
            .iter()
            .next()
            .map(|(_, record)| record.clone())
            .ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert!(record.accessed_at.is_none());
        assert!(record.artifact_path.starts_with(layout.target_artifact(&entry)));
        assert_eq!(fs::read_dir(&record.artifact_path)?.count(), 1);
        Ok(())
    }
}
