use crate::tracking::{TargetEntry, TargetRegistry};
use crate::utils::formatters::display_age;
use crate::{EngineKind, VigilContext};
use anyhow::Result;
use colored::Colorize;

/// Print the registered targets of an engine, files first, then directories
///
/// # Errors
///
/// Returns an error if the registry cannot be read
pub fn execute(ctx: &VigilContext, kind: EngineKind) -> Result<()> {
    let layout = ctx.layout(kind);
    let registry = TargetRegistry::open(&layout)?;

    if registry.is_empty() {
        super::print_info(&format!("No {kind} targets registered"));
        return Ok(());
    }

    let files: Vec<_> = registry.files().collect();
    let directories: Vec<_> = registry.directories().collect();

    if !files.is_empty() {
        println!("{}", "Files:".bold());
        for (id, entry) in &files {
            print_entry(*id, entry);
        }
    }

    if !directories.is_empty() {
        if !files.is_empty() {
            println!();
        }
        println!("{}", "Directories:".bold());
        for (id, entry) in &directories {
            print_entry(*id, entry);
        }
    }

    Ok(())
}

/// One listing line plus a dimmed detail line
fn print_entry(id: u64, entry: &TargetEntry) {
    let marker = if entry.path.exists() {
        String::new()
    } else {
        format!(" {}", "(missing)".red())
    };
    println!(
        "  [{}] {}{marker}",
        id.to_string().yellow().bold(),
        entry.path.display()
    );

    let age = display_age(&entry.added_at).unwrap_or_else(|| entry.added_at.clone());
    println!(
        "      {}",
        format!(
            "{}  added by {} {}",
            entry.artifact_name, entry.added_by, age
        )
        .dimmed()
    );
}
