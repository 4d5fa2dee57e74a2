use crate::{EngineKind, VigilContext};
use anyhow::Result;

/// Turn autostart on or off for an engine
///
/// Sets `<engine>.autostart` in the config file and creates or removes the
/// engine's lock file. A running daemon picks the change up on its next
/// cycle.
///
/// # Errors
///
/// Returns an error if the config or the lock file cannot be written
pub fn execute(ctx: &mut VigilContext, kind: EngineKind, enabled: bool) -> Result<()> {
    ctx.config.set_autostart(kind, enabled);
    ctx.config.save(&ctx.config_path)?;

    let lock = ctx.autostart_lock(kind);
    if enabled {
        lock.create()?;
        super::print_success(&format!("Autostart enabled for {kind}"));
    } else {
        lock.remove()?;
        super::print_success(&format!("Autostart disabled for {kind}"));
    }
    crate::output::verbose(&format!("lock file: {}", lock.path().display()));

    Ok(())
}
