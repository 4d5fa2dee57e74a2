//! Moving artifacts into the quarantine directory without losing data.
//!
//! Nothing already in quarantine is ever overwritten: a file that collides
//! gets a numeric extension appended (`a.bak.1`), and a directory that
//! collides is merged file by file.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// First free path among `dest`, `dest.1`, `dest.2`, ...
#[must_use]
pub fn unique_destination(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let mut n = 1u32;
    loop {
        let mut name = dest.as_os_str().to_owned();
        name.push(format!(".{n}"));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Move `src` to `dest`, merging into an existing directory at `dest`.
///
/// Returns where the item ended up (a file may be renamed to avoid a
/// collision).
///
/// # Errors
///
/// Returns an error if `src` does not exist or any part of it could not be
/// moved; parts that were moved stay moved
pub fn relocate(src: &Path, dest: &Path) -> Result<PathBuf> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("Cannot relocate {}", src.display()))?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if !metadata.is_dir() {
        let dest = unique_destination(dest);
        move_path(src, &dest)?;
        return Ok(dest);
    }

    if !dest.exists() {
        move_path(src, dest)?;
        return Ok(dest.to_path_buf());
    }

    if !dest.is_dir() {
        let dest = unique_destination(dest);
        move_path(src, &dest)?;
        return Ok(dest);
    }

    merge_dir(src, dest)?;
    Ok(dest.to_path_buf())
}

/// Move every file of `src` into the existing directory `dest`, then remove
/// `src`
fn merge_dir(src: &Path, dest: &Path) -> Result<()> {
    let entries: Vec<_> = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("cannot read entry under {}: {e}", src.display());
                None
            }
        })
        .collect();

    let mut failed = 0usize;
    for entry in entries {
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);

        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))
        } else {
            move_path(entry.path(), &unique_destination(&target))
        };

        if let Err(e) = result {
            tracing::warn!(path = %entry.path().display(), "failed to quarantine: {e:#}");
            failed += 1;
        }
    }

    if failed > 0 {
        bail!(
            "{failed} item(s) under {} could not be moved to {}",
            src.display(),
            dest.display()
        );
    }

    fs::remove_dir_all(src).with_context(|| format!("Failed to remove {}", src.display()))
}

/// Rename, falling back to copy and delete across filesystems
fn move_path(src: &Path, dest: &Path) -> Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    if src.is_dir() {
        copy_tree(src, dest)?;
        fs::remove_dir_all(src).with_context(|| format!("Failed to remove {}", src.display()))
    } else {
        fs::copy(src, dest).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dest.display())
        })?;
        fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))
    }
}

/// Recursively copy a directory
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}
