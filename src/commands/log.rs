use crate::engine::Change;
use crate::engine::dispatch::AuditLine;
use crate::tracking::TargetRegistry;
use crate::{EngineKind, VigilContext};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io::ErrorKind;

/// Print a monitoring log with colored fields
///
/// # Errors
///
/// Returns an error if:
/// - The registry cannot be read
/// - No monitoring target has this id
/// - The log exists but cannot be read
pub fn execute(ctx: &VigilContext, id: u64, limit: Option<usize>) -> Result<()> {
    let layout = ctx.layout(EngineKind::Monitoring);
    let registry = TargetRegistry::open(&layout)?;
    let entry = registry
        .get(id)
        .with_context(|| format!("No monitoring target with id {id}"))?;
    let log_path = layout.target_artifact(entry);

    let content = match fs::read_to_string(&log_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", log_path.display()));
        }
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        super::print_info(&format!(
            "No activity recorded for {}",
            entry.path.display()
        ));
        return Ok(());
    }

    println!(
        "{} {}",
        "Log for".bold(),
        entry.path.display().to_string().bold()
    );
    let skip = limit.map_or(0, |n| lines.len().saturating_sub(n));
    for line in lines.into_iter().skip(skip) {
        println!("{}", render_line(line));
    }

    Ok(())
}

/// Colorize one log line; unparseable lines are shown as-is
#[must_use]
pub fn render_line(line: &str) -> String {
    let Some(parsed) = AuditLine::parse(line) else {
        return line.to_string();
    };

    let event = match parsed.event {
        Change::Modified => "modified".yellow().bold(),
        _ => "accessed".cyan(),
    };
    let users = if parsed.users.is_empty() {
        "nobody logged on".dimmed().to_string()
    } else {
        parsed.users.join(", ")
    };

    format!(
        "{}  {:<8}  {}  {} {}",
        parsed.time.dimmed(),
        event,
        parsed.target.bold(),
        "by".dimmed(),
        users
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line_falls_back_to_raw_text() {
        assert_eq!(render_line("free text"), "free text");
    }

    #[test]
    fn test_render_line_keeps_fields() {
        colored::control::set_override(false);
        let rendered =
            render_line("target=a.txt|modified_at=2024-01-01 10:00:00|potentially_by=[alice]");
        assert!(rendered.contains("2024-01-01 10:00:00"));
        assert!(rendered.contains("modified"));
        assert!(rendered.contains("a.txt"));
        assert!(rendered.contains("alice"));
    }
}
