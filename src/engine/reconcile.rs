//! Orphan reconciliation.
//!
//! Two mechanisms keep a managed root consistent with the registry:
//!
//! - [`recover_missing`] runs when a watched file disappears mid-cycle and
//!   moves the part of the artifact that belonged to it into quarantine.
//! - [`sweep`] runs every cycle and quarantines anything directly under the
//!   root (or inside a backed-up directory's artifact) that no registered
//!   target accounts for.

use crate::engine::dispatch::target_of;
use crate::engine::quarantine::relocate;
use crate::tracking::layout::{EngineKind, Layout};
use crate::tracking::{MetadataRecord, Snapshot, TargetRegistry};
use crate::utils::paths::file_base_name;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// What a per-record recovery did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// A single-file target's whole artifact was quarantined. The registry
    /// entry is left for the next snapshot build to drop.
    ArtifactQuarantined,
    /// One file of a directory target was quarantined; the directory is
    /// still watched.
    SliceQuarantined,
    /// The directory target itself is gone: its file's slice was
    /// quarantined and the registry entry removed.
    TargetRetired,
    /// There was nothing left in the artifact to move.
    NothingToDo,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items moved, as their original paths
    pub moved: Vec<PathBuf>,
    /// Items that could not be moved
    pub failed: usize,
}

/// Quarantine the artifact, or artifact slice, of a watched file that no
/// longer exists.
///
/// # Errors
///
/// Returns an error if a move fails or the registry cannot be rewritten
pub fn recover_missing(
    layout: &Layout,
    registry: &mut TargetRegistry,
    path: &Path,
    record: &MetadataRecord,
) -> Result<Recovery> {
    let quarantine = layout.quarantine_dir();

    let Some(parent) = record.parent_dir_path.as_deref().filter(|_| record.as_directory) else {
        if !record.artifact_path.exists() {
            return Ok(Recovery::NothingToDo);
        }
        let dest = quarantine.join(file_base_name(&record.artifact_path));
        let landed = relocate(&record.artifact_path, &dest)?;
        tracing::info!(path = %path.display(), artifact = %landed.display(), "target vanished, artifact quarantined");
        return Ok(Recovery::ArtifactQuarantined);
    };

    let parent_exists = parent.exists();
    let moved = match layout.kind() {
        EngineKind::Backup => quarantine_backup_slice(layout, &record.artifact_path)?,
        EngineKind::Monitoring if parent_exists => {
            extract_log_lines(layout, &record.artifact_path, path)?
        }
        EngineKind::Monitoring => {
            if record.artifact_path.exists() {
                let dest = quarantine.join(file_base_name(&record.artifact_path));
                relocate(&record.artifact_path, &dest)?;
                true
            } else {
                false
            }
        }
    };

    if parent_exists {
        if moved {
            tracing::info!(path = %path.display(), "file left its watched directory, slice quarantined");
            return Ok(Recovery::SliceQuarantined);
        }
        return Ok(Recovery::NothingToDo);
    }

    if layout.kind() == EngineKind::Backup
        && let Some(artifact) = record.artifact_path.parent()
        && is_empty_dir(artifact)
    {
        fs::remove_dir(artifact)
            .with_context(|| format!("Failed to remove {}", artifact.display()))?;
    }

    if let Some(entry) = registry.remove(record.target_id)? {
        tracing::info!(
            id = record.target_id,
            path = %entry.path.display(),
            "watched directory vanished, target retired"
        );
    }
    Ok(Recovery::TargetRetired)
}

/// Move `<root>/<artifact>/<slice>` to `<quarantine>/<artifact>/<slice>`
fn quarantine_backup_slice(layout: &Layout, slice: &Path) -> Result<bool> {
    if !slice.exists() {
        return Ok(false);
    }
    let artifact_name = slice
        .parent()
        .map(file_base_name)
        .context("backup slice has no parent artifact")?;
    let dest = layout
        .quarantine_dir()
        .join(artifact_name)
        .join(file_base_name(slice));
    relocate(slice, &dest)?;
    Ok(true)
}

/// Move the lines about `file` out of a shared directory log into
/// `<quarantine>/<log stem>/<file>.log`
fn extract_log_lines(layout: &Layout, log: &Path, file: &Path) -> Result<bool> {
    let content = match fs::read_to_string(log) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", log.display())),
    };

    let name = file_base_name(file);
    let (moved, kept): (Vec<&str>, Vec<&str>) = content
        .lines()
        .partition(|line| target_of(line) == Some(name.as_str()));
    if moved.is_empty() {
        return Ok(false);
    }

    let stem = log
        .file_stem()
        .map_or_else(|| file_base_name(log), |s| s.to_string_lossy().into_owned());
    let dest_dir = layout.quarantine_dir().join(stem);
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
    let dest = dest_dir.join(format!("{name}.log"));

    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&dest)
        .with_context(|| format!("Failed to open {}", dest.display()))?;
    for line in &moved {
        writeln!(out, "{line}")?;
    }
    out.flush()?;

    let dir = log.parent().unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        for line in kept.iter().filter(|line| !line.is_empty()) {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
    }
    temp.persist(log)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rewrite {}", log.display()))?;
    Ok(true)
}

/// Quarantine everything in the managed root that no registered target
/// accounts for.
///
/// Failures are logged per item and counted; the sweep always runs to
/// completion.
pub fn sweep(layout: &Layout, registry: &TargetRegistry, snapshot: &Snapshot) -> SweepReport {
    let mut report = SweepReport::default();
    let quarantine = layout.quarantine_dir();

    let expected: HashSet<&str> = registry
        .iter()
        .map(|(_, entry)| entry.artifact_name.as_str())
        .collect();

    let mut expected_slices: HashMap<u64, HashSet<String>> = HashMap::new();
    if layout.kind() == EngineKind::Backup {
        // Only targets listed this cycle have a known set of live slices
        for (id, _) in registry.directories() {
            if snapshot.expanded(id) {
                expected_slices.entry(id).or_default();
            }
        }
        for (_, record) in snapshot.iter() {
            if record.as_directory && snapshot.expanded(record.target_id) {
                expected_slices
                    .entry(record.target_id)
                    .or_default()
                    .insert(file_base_name(&record.artifact_path));
            }
        }
    }

    let children = match fs::read_dir(layout.root()) {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!(root = %layout.root().display(), "cannot read managed root: {e}");
            return report;
        }
    };

    for child in children.flatten() {
        let name = child.file_name().to_string_lossy().into_owned();
        if layout.is_reserved(&name) || expected.contains(name.as_str()) {
            continue;
        }
        move_orphan(&child.path(), &quarantine.join(&name), &mut report);
    }

    for (id, slices) in &expected_slices {
        let Some(entry) = registry.get(*id) else {
            continue;
        };
        let artifact = layout.target_artifact(entry);
        let Ok(children) = fs::read_dir(&artifact) else {
            continue;
        };
        for child in children.flatten() {
            let name = child.file_name().to_string_lossy().into_owned();
            if slices.contains(&name) {
                continue;
            }
            let dest = quarantine.join(&entry.artifact_name).join(&name);
            move_orphan(&child.path(), &dest, &mut report);
        }
    }

    if !report.moved.is_empty() || report.failed > 0 {
        tracing::info!(
            moved = report.moved.len(),
            failed = report.failed,
            "swept orphaned artifacts"
        );
    }
    report
}

/// Relocate one orphan, recording the outcome
fn move_orphan(src: &Path, dest: &Path, report: &mut SweepReport) {
    match relocate(src, dest) {
        Ok(landed) => {
            tracing::debug!(from = %src.display(), to = %landed.display(), "quarantined orphan");
            report.moved.push(src.to_path_buf());
        }
        Err(e) => {
            tracing::warn!(path = %src.display(), "failed to quarantine orphan: {e:#}");
            report.failed += 1;
        }
    }
}

/// Whether `dir` is a directory with no entries
fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}
