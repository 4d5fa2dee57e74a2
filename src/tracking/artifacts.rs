//! Artifact naming and creation.
//!
//! Every target gets an artifact name `<base>_<suffix>` where `<suffix>` is a
//! random 8 character alphanumeric string drawn at registration. Monitoring
//! artifacts are log files (`<base>_<suffix>.log`); backup artifacts are
//! directories holding `<file_base>_<stamp>.bak` copies. A backed-up
//! directory gets one slice directory per contained file,
//! `<artifact>/<file_base>_<suffix>`, reusing the target's suffix.

use crate::tracking::layout::{EngineKind, Layout};
use crate::tracking::registry::TargetEntry;
use crate::utils::formatters::format_stamp_at;
use crate::utils::paths::{ensure_parent_dirs, file_base_name};
use anyhow::{Context, Result};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Length of the random artifact suffix
pub const SUFFIX_LEN: usize = 8;

/// Extension of monitoring logs
pub const LOG_EXTENSION: &str = "log";

/// Extension of backup copies
pub const BACKUP_EXTENSION: &str = "bak";

/// Draw a fresh random artifact suffix
#[must_use]
pub fn random_suffix() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// Artifact name for a target at `path`
#[must_use]
pub fn artifact_name(kind: EngineKind, path: &Path, suffix: &str) -> String {
    let base = file_base_name(path);
    match kind {
        EngineKind::Monitoring => format!("{base}_{suffix}.{LOG_EXTENSION}"),
        EngineKind::Backup => format!("{base}_{suffix}"),
    }
}

/// Random suffix embedded in an artifact name (text after the last `_`)
#[must_use]
pub fn suffix_of(artifact_name: &str) -> &str {
    let stem = artifact_name
        .strip_suffix(".log")
        .unwrap_or(artifact_name);
    stem.rsplit_once('_').map_or("", |(_, suffix)| suffix)
}

/// Slice directory name for one file of a backed-up directory
#[must_use]
pub fn slice_dir_name(file: &Path, suffix: &str) -> String {
    format!("{}_{suffix}", file_base_name(file))
}

/// Backup copy name for `file` stamped with `stamp`
#[must_use]
pub fn backup_file_name(file: &Path, stamp: &str) -> String {
    format!("{}_{stamp}.{BACKUP_EXTENSION}", file_base_name(file))
}

/// Copy `source` into `dir` as a new `<base>_<stamp>.bak` file.
///
/// Existing copies are never overwritten: when the name is taken (two
/// changes within one stamp resolution) a zero-padded `_NNN` counter is
/// appended to the stamp, so later copies still sort after earlier ones.
/// The directory is created on demand.
///
/// # Errors
///
/// Returns an error if the source cannot be opened (including `NotFound`
/// when it vanished), or the directory or copy cannot be written
pub fn write_backup(source: &Path, dir: &Path, stamp: &str) -> Result<PathBuf> {
    let mut input = File::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;

    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            dir.join(backup_file_name(source, stamp))
        } else {
            dir.join(backup_file_name(source, &format!("{stamp}_{attempt:03}")))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut output) => {
                io::copy(&mut input, &mut output).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        source.display(),
                        candidate.display()
                    )
                })?;
                output.sync_all()?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create {}", candidate.display()));
            }
        }
    }
}

/// Write an initial copy of `source` into `dir`, stamped with the current time
///
/// # Errors
///
/// Returns an error if the copy cannot be written
pub fn seed_backup(source: &Path, dir: &Path) -> Result<PathBuf> {
    write_backup(source, dir, &format_stamp_at(chrono::Local::now()))
}

/// Create the artifact of a freshly registered target.
///
/// - Monitoring: an empty log file
/// - Backup file target: the artifact directory with one seed copy
/// - Backup directory target: one seeded slice per direct child file
///
/// # Errors
///
/// Returns an error if the artifact cannot be created
pub fn create_artifact(layout: &Layout, entry: &TargetEntry) -> Result<()> {
    let artifact = layout.target_artifact(entry);
    match layout.kind() {
        EngineKind::Monitoring => {
            ensure_parent_dirs(&artifact)?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&artifact)
                .with_context(|| format!("Failed to create log {}", artifact.display()))?;
        }
        EngineKind::Backup if entry.is_directory => {
            fs::create_dir_all(&artifact)
                .with_context(|| format!("Failed to create {}", artifact.display()))?;
            for file in direct_child_files(&entry.path)? {
                seed_backup(&file, &layout.file_artifact(entry, &file))?;
            }
        }
        EngineKind::Backup => {
            seed_backup(&entry.path, &artifact)?;
        }
    }
    Ok(())
}

/// Regular files directly inside `dir`, sorted by path
///
/// # Errors
///
/// Returns an error if the directory cannot be listed
pub fn direct_child_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
