use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Timestamp layout embedded in backup file names. Sorts lexically in
/// chronological order and contains no characters that are awkward in paths.
pub const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamp layout used in audit lines and listings.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a filesystem time for use in a backup file name
#[must_use]
pub fn format_stamp(time: SystemTime) -> String {
    format_stamp_at(DateTime::<Local>::from(time))
}

/// Formats a wall-clock time for use in a backup file name
#[must_use]
pub fn format_stamp_at(time: DateTime<Local>) -> String {
    time.format(STAMP_FORMAT).to_string()
}

/// Formats a wall-clock time for audit lines and listings
#[must_use]
pub fn format_display(time: DateTime<Local>) -> String {
    time.format(DISPLAY_FORMAT).to_string()
}

/// Formats a relative time from now
#[must_use]
pub fn format_relative_time(timestamp: i64) -> String {
    use chrono::Utc;

    let now = Utc::now().timestamp();
    let diff = now - timestamp;

    if diff < 0 {
        return "in the future".to_string();
    }

    let (value, unit) = if diff < 60 {
        (diff, "second")
    } else if diff < 3600 {
        (diff / 60, "minute")
    } else if diff < 86400 {
        (diff / 3600, "hour")
    } else if diff < 2_592_000 {
        (diff / 86400, "day")
    } else if diff < 31_536_000 {
        (diff / 2_592_000, "month")
    } else {
        (diff / 31_536_000, "year")
    };

    if value == 1 {
        format!("{value} {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// Relative age of a display-formatted local timestamp, if it parses.
#[must_use]
pub fn display_age(display: &str) -> Option<String> {
    let naive = chrono::NaiveDateTime::parse_from_str(display, DISPLAY_FORMAT).ok()?;
    let local = naive.and_local_timezone(Local).earliest()?;
    Some(format_relative_time(local.timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_sorts_chronologically() {
        let earlier = Local.with_ymd_and_hms(2024, 9, 30, 23, 59, 59).single();
        let later = Local.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).single();
        let (Some(earlier), Some(later)) = (earlier, later) else {
            return;
        };

        let a = format_stamp_at(earlier);
        let b = format_stamp_at(later);
        assert_eq!(a, "2024-09-30_23-59-59");
        assert!(a < b);
    }

    #[test]
    fn test_display_format() {
        if let Some(time) = Local.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).single() {
            assert_eq!(format_display(time), "2023-01-02 03:04:05");
        }
    }

    #[test]
    fn test_relative_time() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_relative_time(now + 100), "in the future");
        assert_eq!(format_relative_time(now - 3600), "1 hour ago");
        assert_eq!(format_relative_time(now - 3 * 86400), "3 days ago");
    }

    #[test]
    fn test_display_age() {
        assert!(display_age("not a time").is_none());
        let shown = format_display(Local::now() - chrono::Duration::minutes(5));
        assert_eq!(display_age(&shown).as_deref(), Some("5 minutes ago"));
    }
}
