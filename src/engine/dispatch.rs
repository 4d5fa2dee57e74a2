//! Per-change actions: audit lines for monitoring, versioned copies for
//! backup.

use crate::config::StampPolicy;
use crate::engine::detect::Change;
use crate::tracking::artifacts::write_backup;
use crate::tracking::layout::EngineKind;
use crate::tracking::MetadataRecord;
use crate::utils::formatters::{format_display, format_stamp, format_stamp_at};
use crate::utils::paths::{ensure_parent_dirs, file_base_name};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Field separator in audit lines
pub const DELIMITER: char = '|';
/// Prefix of the target field
pub const TARGET_FIELD: &str = "target=";
/// Prefix of the user list field
pub const USERS_FIELD: &str = "potentially_by=";

/// Everything a dispatch needs besides the record itself
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Users logged on when the cycle started
    pub users: &'a [String],
    /// Cycle wall-clock time
    pub now: DateTime<Local>,
    /// Configured poll interval, used for backdated stamps
    pub poll_interval: Duration,
    /// Which instant backup names are stamped with
    pub stamp: StampPolicy,
}

/// One line of a monitoring log.
///
/// `target=<name>|accessed_at=<time>|potentially_by=[alice, bob]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLine {
    /// File name of the watched file
    pub target: String,
    /// `Accessed` or `Modified`
    pub event: Change,
    /// Display-formatted event time
    pub time: String,
    /// Users logged on at the time
    pub users: Vec<String>,
}

impl AuditLine {
    /// Parse a log line, returning `None` for anything malformed
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim_end().split(DELIMITER);
        let target = fields.next()?.strip_prefix(TARGET_FIELD)?.to_string();

        let (key, time) = fields.next()?.split_once('=')?;
        let event = match key {
            "accessed_at" => Change::Accessed,
            "modified_at" => Change::Modified,
            _ => return None,
        };

        let users = fields
            .next()?
            .strip_prefix(USERS_FIELD)?
            .strip_prefix('[')?
            .strip_suffix(']')?;
        let users = users
            .split(", ")
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        Some(Self {
            target,
            event,
            time: time.to_string(),
            users,
        })
    }
}

impl fmt::Display for AuditLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TARGET_FIELD}{}{DELIMITER}{}={}{DELIMITER}{USERS_FIELD}[{}]",
            self.target,
            self.event.as_str(),
            self.time,
            self.users.join(", ")
        )
    }
}

/// Name of the watched file a log line is about, without parsing the rest
#[must_use]
pub fn target_of(line: &str) -> Option<&str> {
    line.split(DELIMITER).next()?.strip_prefix(TARGET_FIELD)
}

/// Perform the engine's action for one detected change.
///
/// Returns the artifact written (log file or new backup copy), or `None`
/// when the engine has nothing to do for this kind of change.
///
/// # Errors
///
/// Returns an error if the artifact cannot be written. A source that
/// vanished between detection and copy surfaces as an `io::Error` of kind
/// `NotFound` in the error chain.
pub fn dispatch(
    kind: EngineKind,
    live_path: &Path,
    record: &MetadataRecord,
    change: Change,
    ctx: &DispatchContext<'_>,
) -> Result<Option<PathBuf>> {
    match (kind, change) {
        (_, Change::Unchanged) | (EngineKind::Backup, Change::Accessed) => Ok(None),
        (EngineKind::Monitoring, event) => {
            let line = AuditLine {
                target: file_base_name(live_path),
                event,
                time: format_display(ctx.now),
                users: ctx.users.to_vec(),
            };
            append_line(&record.artifact_path, &line)?;
            Ok(Some(record.artifact_path.clone()))
        }
        (EngineKind::Backup, Change::Modified) => {
            let stamp = match ctx.stamp {
                StampPolicy::Modified => format_stamp(record.modified_at),
                StampPolicy::Backdated => format_stamp_at(
                    ctx.now
                        - chrono::Duration::from_std(ctx.poll_interval)
                            .unwrap_or_else(|_| chrono::Duration::zero()),
                ),
            };
            let copy = write_backup(live_path, &record.artifact_path, &stamp)?;
            Ok(Some(copy))
        }
    }
}

/// Append one line to a log and flush it
fn append_line(log: &Path, line: &AuditLine) -> Result<()> {
    ensure_parent_dirs(log)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .with_context(|| format!("Failed to open log {}", log.display()))?;
    writeln!(file, "{line}").with_context(|| format!("Failed to append to {}", log.display()))?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn ctx(users: &[String]) -> DispatchContext<'_> {
        DispatchContext {
            users,
            now: Local::now(),
            poll_interval: Duration::from_secs(5),
            stamp: StampPolicy::Modified,
        }
    }

    fn record(artifact_path: PathBuf) -> MetadataRecord {
        MetadataRecord {
            target_id: 1,
            modified_at: SystemTime::now(),
            accessed_at: None,
            artifact_path,
            parent_dir_path: None,
            as_directory: false,
        }
    }

    #[test]
    fn test_audit_line_format() {
        let line = AuditLine {
            target: "notes.txt".to_string(),
            event: Change::Accessed,
            time: "2024-05-01 09:30:00".to_string(),
            users: vec!["alice".to_string(), "bob".to_string()],
        };
        let text = line.to_string();
        assert_eq!(
            text,
            "target=notes.txt|accessed_at=2024-05-01 09:30:00|potentially_by=[alice, bob]"
        );
        assert_eq!(AuditLine::parse(&text), Some(line));
        assert_eq!(target_of(&text), Some("notes.txt"));
    }

    #[test]
    fn test_audit_line_parse_rejects_garbage() {
        assert_eq!(AuditLine::parse(""), None);
        assert_eq!(AuditLine::parse("hello world"), None);
        assert_eq!(AuditLine::parse("target=a|opened_at=x|potentially_by=[]"), None);

        let empty = AuditLine::parse("target=a|modified_at=x|potentially_by=[]");
        assert_eq!(empty.map(|l| l.users), Some(Vec::new()));
    }

    #[test]
    fn test_monitoring_appends_one_line_per_change() -> Result<()> {
        let temp = TempDir::new()?;
        let log = temp.path().join("a.txt_AAAAAAAA.log");
        let live = temp.path().join("a.txt");
        let users = vec!["alice".to_string()];
        let rec = record(log.clone());

        dispatch(EngineKind::Monitoring, &live, &rec, Change::Modified, &ctx(&users))?;
        dispatch(EngineKind::Monitoring, &live, &rec, Change::Accessed, &ctx(&users))?;
        dispatch(EngineKind::Monitoring, &live, &rec, Change::Unchanged, &ctx(&users))?;

        let content = fs::read_to_string(&log)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("target=a.txt|modified_at="));
        assert!(lines[1].contains("|accessed_at="));
        assert!(lines[1].ends_with("|potentially_by=[alice]"));
        Ok(())
    }

    #[test]
    fn test_backup_ignores_access() -> Result<()> {
        let temp = TempDir::new()?;
        let live = temp.path().join("a.txt");
        fs::write(&live, "x")?;
        let rec = record(temp.path().join("store"));

        let written = dispatch(EngineKind::Backup, &live, &rec, Change::Accessed, &ctx(&[]))?;
        assert!(written.is_none());
        assert!(!temp.path().join("store").exists());
        Ok(())
    }

    #[test]
    fn test_backup_copies_content() -> Result<()> {
        let temp = TempDir::new()?;
        let live = temp.path().join("a.txt");
        fs::write(&live, "content")?;
        let rec = record(temp.path().join("store"));

        let copy = dispatch(EngineKind::Backup, &live, &rec, Change::Modified, &ctx(&[]))?
            .ok_or_else(|| anyhow::anyhow!("no copy written"))?;
        assert_eq!(fs::read_to_string(&copy)?, "content");
        let name = file_base_name(&copy);
        assert!(name.starts_with("a.txt_"));
        assert!(name.ends_with(".bak"));
        Ok(())
    }
}
