//! Timestamp-diff change detection.

use crate::tracking::{FileTimes, MetadataRecord};
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Result of looking at a watched path on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The file exists; its current times
    Present(FileTimes),
    /// The file no longer exists
    Gone,
}

/// Stat a watched file.
///
/// # Errors
///
/// Returns an error for any failure other than the path not existing
pub fn probe(path: &Path) -> Result<Probe> {
    match FileTimes::read(path) {
        Ok(times) => Ok(Probe::Present(times)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Probe::Gone),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    }
}

/// What happened to a watched file since it was last seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Nothing newer than the record
    Unchanged,
    /// Read since last seen (monitoring only)
    Accessed,
    /// Written since last seen
    Modified,
}

impl Change {
    /// Field name used for this event in audit lines
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Accessed => "accessed_at",
            Self::Modified => "modified_at",
        }
    }
}

/// Compare `live` against `record` and move the record forward.
///
/// A newer modification time wins over a newer access time, so at most one
/// event is reported per call. On modification the access time is also
/// refreshed for records that track it, since writing a file usually touches
/// its atime too. Recorded times never move backwards.
pub fn classify(record: &mut MetadataRecord, live: FileTimes) -> Change {
    if live.modified > record.modified_at {
        record.modified_at = live.modified;
        if let Some(accessed) = record.accessed_at.as_mut() {
            *accessed = (*accessed).max(live.accessed);
        }
        return Change::Modified;
    }

    if let Some(accessed) = record.accessed_at.as_mut()
        && live.accessed > *accessed
    {
        *accessed = live.accessed;
        return Change::Accessed;
    }

    Change::Unchanged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn record(modified: u64, accessed: Option<u64>) -> MetadataRecord {
        MetadataRecord {
            target_id: 1,
            modified_at: at(modified),
            accessed_at: accessed.map(at),
            artifact_path: PathBuf::from("/root/a_x.log"),
            parent_dir_path: None,
            as_directory: false,
        }
    }

    #[rstest]
    #[case::nothing_new(Some(100), 100, 100, Change::Unchanged)]
    #[case::read(Some(100), 100, 150, Change::Accessed)]
    #[case::written(Some(100), 200, 100, Change::Modified)]
    #[case::written_and_read(Some(100), 200, 250, Change::Modified)]
    #[case::backup_ignores_reads(None, 100, 150, Change::Unchanged)]
    #[case::backup_written(None, 200, 100, Change::Modified)]
    #[case::clock_went_back(Some(100), 50, 50, Change::Unchanged)]
    fn test_classify(
        #[case] accessed: Option<u64>,
        #[case] live_modified: u64,
        #[case] live_accessed: u64,
        #[case] expected: Change,
    ) {
        let mut rec = record(100, accessed);
        let live = FileTimes {
            modified: at(live_modified),
            accessed: at(live_accessed),
        };
        assert_eq!(classify(&mut rec, live), expected);
        assert!(rec.modified_at >= at(100));
    }

    #[test]
    fn test_modification_refreshes_access_time() {
        let mut rec = record(100, Some(100));
        let live = FileTimes {
            modified: at(200),
            accessed: at(250),
        };
        assert_eq!(classify(&mut rec, live), Change::Modified);
        assert_eq!(rec.accessed_at, Some(at(250)));
        // The same live times are not reported again
        assert_eq!(classify(&mut rec, live), Change::Unchanged);
    }

    #[test]
    fn test_probe() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("a.txt");
        assert_eq!(probe(&file)?, Probe::Gone);

        std::fs::write(&file, "x")?;
        assert!(matches!(probe(&file)?, Probe::Present(_)));
        Ok(())
    }
}
