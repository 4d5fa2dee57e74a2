use crate::tracking::TargetRegistry;
use crate::utils::{expand_tilde, get_current_user};
use crate::{EngineKind, VigilContext};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

/// Register paths with an engine, creating their artifacts
///
/// # Errors
///
/// Returns an error if:
/// - The registry cannot be read or written
/// - A path cannot be registered and `force` is not set
pub fn execute(ctx: &VigilContext, kind: EngineKind, paths: &[PathBuf], force: bool) -> Result<()> {
    let layout = ctx.layout(kind);
    layout.ensure_exists()?;
    let mut registry = TargetRegistry::open(&layout)?;
    let user = get_current_user();

    let mut added = 0usize;
    for path in paths {
        let path = expand_tilde(path)?;
        match registry.register(&path, &user) {
            Ok((id, entry)) => {
                let kind_label = if entry.is_directory { "dir" } else { "file" };
                println!(
                    "  {} [{}] {} {}",
                    "added:".green(),
                    id.to_string().bold(),
                    entry.path.display(),
                    format!("({kind_label})").dimmed()
                );
                added += 1;
            }
            Err(e) if force => {
                super::print_warning(&format!("Skipping {}: {e}", path.display()));
            }
            Err(e) => return Err(e),
        }
    }

    if added == 0 {
        super::print_info("No targets added");
    } else {
        super::print_success(&format!(
            "Added {added} target{} to {kind}",
            if added == 1 { "" } else { "s" }
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::test_context;
    use std::fs;

    #[test]
    fn test_add_registers_paths() -> Result<()> {
        let (temp, ctx) = test_context()?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "a")?;

        execute(&ctx, EngineKind::Backup, &[file], false)?;

        let registry = TargetRegistry::open(&ctx.layout(EngineKind::Backup))?;
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn test_force_skips_bad_paths() -> Result<()> {
        let (temp, ctx) = test_context()?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "a")?;
        let missing = temp.path().join("missing.txt");

        assert!(execute(&ctx, EngineKind::Monitoring, &[missing.clone()], false).is_err());
        execute(&ctx, EngineKind::Monitoring, &[missing, file], true)?;

        let registry = TargetRegistry::open(&ctx.layout(EngineKind::Monitoring))?;
        assert_eq!(registry.len(), 1);
        Ok(())
    }
}
