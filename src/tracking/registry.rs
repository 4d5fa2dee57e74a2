//! Durable JSON store of tracked targets.
//!
//! The registry is the source of truth for "what should be watched". It maps
//! integer ids to [`TargetEntry`] values and is rewritten as a whole on every
//! change:
//!
//! ```json
//! {
//!   "1": {
//!     "path": "/home/me/notes.txt",
//!     "artifact_name": "notes.txt_Ab3dEf9h",
//!     "is_directory": false,
//!     "added_by": "me",
//!     "added_at": "2024-05-01 09:30:00"
//!   }
//! }
//! ```
//!
//! Both the CLI and the daemon write the same file, so every mutation
//! re-reads the file under an exclusive advisory lock, applies the change and
//! replaces the file atomically.

use crate::tracking::artifacts::{self, artifact_name, random_suffix};
use crate::tracking::layout::Layout;
use crate::utils::formatters::format_display;
use crate::utils::paths::{ensure_parent_dirs, make_absolute};
use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One registered target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    /// Absolute path of the watched file or directory
    pub path: PathBuf,
    /// Name of the artifact inside the managed root, fixed at registration
    #[serde(alias = "log_filename", alias = "backup_dirname")]
    pub artifact_name: String,
    /// Whether the target was a directory when registered
    pub is_directory: bool,
    /// User that registered the target
    pub added_by: String,
    /// Registration time, display formatted
    pub added_at: String,
}

/// Id-keyed registry of one engine, mirrored from its JSON file
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    /// Managed root the registry belongs to
    layout: Layout,
    /// In-memory copy of the file as of the last load or write
    entries: BTreeMap<u64, TargetEntry>,
}

impl TargetRegistry {
    /// Load the registry of a managed root
    ///
    /// A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// valid registry
    pub fn open(layout: &Layout) -> Result<Self> {
        let entries = read_entries(&layout.registry_path())?;
        Ok(Self {
            layout: layout.clone(),
            entries,
        })
    }

    /// Re-read the file, picking up changes made by other processes
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn reload(&mut self) -> Result<()> {
        self.entries = read_entries(&self.layout.registry_path())?;
        Ok(())
    }

    /// Apply `change` to the on-disk registry under its write lock.
    ///
    /// The file is re-read after the lock is taken so concurrent writers never
    /// lose each other's entries. Nothing is written when `change` fails.
    ///
    /// # Errors
    ///
    /// Returns an error if locking, reading or writing fails, or if `change`
    /// itself fails
    pub fn modify<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<u64, TargetEntry>) -> Result<T>,
    {
        let registry_path = self.layout.registry_path();
        ensure_parent_dirs(&registry_path)?;

        let lock_path = self.layout.registry_lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Failed to lock registry: {}", lock_path.display()))?;

        let mut entries = read_entries(&registry_path)?;
        let result = change(&mut entries)?;
        write_entries(&registry_path, &entries)?;
        self.entries = entries;

        drop(lock_file);
        Ok(result)
    }

    /// Add an entry under the next free id (one past the highest in use)
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written
    pub fn insert(&mut self, entry: TargetEntry) -> Result<u64> {
        self.modify(|entries| {
            let id = next_id(entries);
            entries.insert(id, entry);
            Ok(id)
        })
    }

    /// Remove one entry, returning it if it was present
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written
    pub fn remove(&mut self, id: u64) -> Result<Option<TargetEntry>> {
        self.modify(|entries| Ok(entries.remove(&id)))
    }

    /// Remove several entries in one write, returning those that were present
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written
    pub fn remove_all(&mut self, ids: &[u64]) -> Result<Vec<(u64, TargetEntry)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.modify(|entries| {
            Ok(ids
                .iter()
                .filter_map(|id| entries.remove(id).map(|entry| (*id, entry)))
                .collect())
        })
    }

    /// Register a file or directory and create its artifact.
    ///
    /// The path is canonicalized first. The entry is persisted before the
    /// artifact is created; a partially created artifact is completed by the
    /// next snapshot build.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path does not exist
    /// - The path is already registered
    /// - The path lies inside the managed root
    /// - The registry or the artifact cannot be written
    pub fn register(&mut self, path: &Path, user: &str) -> Result<(u64, TargetEntry)> {
        let absolute = make_absolute(path)?;
        if !absolute.exists() {
            bail!("Path does not exist: {}", absolute.display());
        }
        let canonical = absolute
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", absolute.display()))?;

        let root = self
            .layout
            .root()
            .canonicalize()
            .unwrap_or_else(|_| self.layout.root().to_path_buf());
        if canonical.starts_with(&root) {
            bail!(
                "Refusing to track {} inside the managed root {}",
                canonical.display(),
                root.display()
            );
        }

        let entry = TargetEntry {
            artifact_name: artifact_name(self.layout.kind(), &canonical, &random_suffix()),
            is_directory: canonical.is_dir(),
            added_by: user.to_string(),
            added_at: format_display(chrono::Local::now()),
            path: canonical,
        };

        let id = self.modify(|entries| {
            if entries.values().any(|existing| existing.path == entry.path) {
                bail!("Already tracked: {}", entry.path.display());
            }
            let id = next_id(entries);
            entries.insert(id, entry.clone());
            Ok(id)
        })?;

        artifacts::create_artifact(&self.layout, &entry)?;
        tracing::info!(id, path = %entry.path.display(), artifact = %entry.artifact_name, "registered target");
        Ok((id, entry))
    }

    /// Stop tracking a target. Its artifact stays in the managed root until
    /// the next sweep quarantines it.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown or the registry cannot be written
    pub fn unregister(&mut self, id: u64) -> Result<TargetEntry> {
        let removed = self.modify(|entries| {
            entries
                .remove(&id)
                .with_context(|| format!("No target with id {id}"))
        })?;
        tracing::info!(id, path = %removed.path.display(), "unregistered target");
        Ok(removed)
    }

    /// Entry by id
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&TargetEntry> {
        self.entries.get(&id)
    }

    /// Id of the entry for `path`, if registered
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<u64> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.path == path)
            .map(|(id, _)| *id)
    }

    /// All entries in id order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &TargetEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// File targets in id order
    pub fn files(&self) -> impl Iterator<Item = (u64, &TargetEntry)> {
        self.iter().filter(|(_, entry)| !entry.is_directory)
    }

    /// Directory targets in id order
    pub fn directories(&self) -> impl Iterator<Item = (u64, &TargetEntry)> {
        self.iter().filter(|(_, entry)| entry.is_directory)
    }

    /// Number of registered targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Managed root this registry belongs to
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }
}

/// One past the highest id in use
fn next_id(entries: &BTreeMap<u64, TargetEntry>) -> u64 {
    entries.keys().next_back().map_or(1, |last| last + 1)
}

/// Parse the registry file; a missing file is empty
fn read_entries(path: &Path) -> Result<BTreeMap<u64, TargetEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read registry: {}", path.display()));
        }
    };

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registry: {}", path.display()))
}

/// Replace the registry file with `entries` via a sibling temp file
fn write_entries(path: &Path, entries: &BTreeMap<u64, TargetEntry>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, entries)
            .context("Failed to serialize registry")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace registry: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::layout::EngineKind;
    use tempfile::TempDir;

    fn setup(kind: EngineKind) -> Result<(TempDir, Layout)> {
        let temp = TempDir::new()?;
        let layout = Layout::new(kind, temp.path().join("root"));
        layout.ensure_exists()?;
        Ok((temp, layout))
    }

    fn sample(path: &str) -> TargetEntry {
        TargetEntry {
            path: PathBuf::from(path),
            artifact_name: "x_AAAAAAAA".to_string(),
            is_directory: false,
            added_by: "tester".to_string(),
            added_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Backup)?;
        let registry = TargetRegistry::open(&layout)?;
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Backup)?;
        fs::write(layout.registry_path(), "{ not json")?;
        assert!(TargetRegistry::open(&layout).is_err());
        Ok(())
    }

    #[test]
    fn test_ids_follow_highest_in_use() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Monitoring)?;
        let mut registry = TargetRegistry::open(&layout)?;

        assert_eq!(registry.insert(sample("/a"))?, 1);
        assert_eq!(registry.insert(sample("/b"))?, 2);
        assert_eq!(registry.insert(sample("/c"))?, 3);
        registry.remove(2)?;
        // A removed id in the middle is never reused for a later entry
        assert_eq!(registry.insert(sample("/d"))?, 4);
        registry.remove(4)?;
        assert_eq!(registry.insert(sample("/e"))?, 4);
        Ok(())
    }

    #[test]
    fn test_writes_are_visible_to_other_handles() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Backup)?;
        let mut writer = TargetRegistry::open(&layout)?;
        let mut reader = TargetRegistry::open(&layout)?;

        writer.insert(sample("/a"))?;
        assert!(reader.is_empty());
        reader.reload()?;
        assert_eq!(reader.len(), 1);

        // The stale handle re-reads before writing, so nothing is lost
        reader.insert(sample("/b"))?;
        writer.reload()?;
        assert_eq!(writer.len(), 2);
        Ok(())
    }

    #[test]
    fn test_legacy_field_names_are_accepted() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Monitoring)?;
        fs::write(
            layout.registry_path(),
            r#"{"1": {"path": "/tmp/x", "log_filename": "x_AbCdEfGh.log",
                "is_directory": false, "added_by": "me", "added_at": "2024-01-01 10:00:00"}}"#,
        )?;
        let registry = TargetRegistry::open(&layout)?;
        assert_eq!(
            registry.get(1).map(|e| e.artifact_name.as_str()),
            Some("x_AbCdEfGh.log")
        );
        Ok(())
    }

    #[test]
    fn test_failed_change_writes_nothing() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Backup)?;
        let mut registry = TargetRegistry::open(&layout)?;
        registry.insert(sample("/a"))?;

        let result: Result<()> = registry.modify(|entries| {
            entries.clear();
            bail!("abort")
        });
        assert!(result.is_err());

        registry.reload()?;
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn test_register_rejects_duplicates_and_missing_paths() -> Result<()> {
        let (temp, layout) = setup(EngineKind::Monitoring)?;
        let file = temp.path().join("watched.txt");
        fs::write(&file, "hello")?;

        let mut registry = TargetRegistry::open(&layout)?;
        let (id, entry) = registry.register(&file, "tester")?;
        assert_eq!(id, 1);
        assert!(entry.artifact_name.starts_with("watched.txt_"));
        assert!(entry.artifact_name.ends_with(".log"));
        assert!(layout.target_artifact(&entry).is_file());

        assert!(registry.register(&file, "tester").is_err());
        assert!(registry.register(&temp.path().join("nope"), "tester").is_err());
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn test_register_rejects_paths_inside_root() -> Result<()> {
        let (_temp, layout) = setup(EngineKind::Backup)?;
        let inside = layout.root().join("stray.txt");
        fs::write(&inside, "x")?;

        let mut registry = TargetRegistry::open(&layout)?;
        assert!(registry.register(&inside, "tester").is_err());
        Ok(())
    }

    #[test]
    fn test_unregister_keeps_artifact() -> Result<()> {
        let (temp, layout) = setup(EngineKind::Backup)?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "v1")?;

        let mut registry = TargetRegistry::open(&layout)?;
        let (id, entry) = registry.register(&file, "tester")?;
        let removed = registry.unregister(id)?;
        assert_eq!(removed, entry);
        assert!(registry.is_empty());
        assert!(layout.target_artifact(&entry).is_dir());
        assert!(registry.unregister(id).is_err());
        Ok(())
    }
}
