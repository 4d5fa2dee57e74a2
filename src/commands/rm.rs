use crate::tracking::TargetRegistry;
use crate::{EngineKind, VigilContext};
use anyhow::Result;
use colored::Colorize;

/// Unregister targets by id
///
/// Artifacts are left in place; the running daemon quarantines them on its
/// next sweep.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or written. Unknown ids
/// are reported and skipped.
pub fn execute(ctx: &VigilContext, kind: EngineKind, ids: &[u64]) -> Result<()> {
    let layout = ctx.layout(kind);
    let mut registry = TargetRegistry::open(&layout)?;

    let mut removed = 0usize;
    for &id in ids {
        if registry.get(id).is_none() {
            super::print_warning(&format!("No {kind} target with id {id}"));
            continue;
        }
        let entry = registry.unregister(id)?;
        println!(
            "  {} [{}] {}",
            "removed:".red(),
            id.to_string().bold(),
            entry.path.display()
        );
        removed += 1;
    }

    if removed > 0 {
        super::print_success(&format!(
            "Removed {removed} target{} from {kind}",
            if removed == 1 { "" } else { "s" }
        ));
        crate::output::info("Artifacts move to the orphanage on the daemon's next cycle");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::test_context;
    use crate::utils::get_current_user;
    use std::fs;

    #[test]
    fn test_rm_unregisters_and_skips_unknown_ids() -> Result<()> {
        let (temp, ctx) = test_context()?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "a")?;

        let layout = ctx.layout(EngineKind::Backup);
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)?;
        let (id, entry) = registry.register(&file, &get_current_user())?;

        execute(&ctx, EngineKind::Backup, &[id, 999])?;

        registry.reload()?;
        assert!(registry.is_empty());
        assert!(layout.target_artifact(&entry).exists());
        Ok(())
    }
}
