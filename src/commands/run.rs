use crate::engine::{Engine, ServiceLoop};
use crate::lock::{AutostartGate, InstanceLock};
use crate::users::WhoCommand;
use crate::{EngineKind, VigilContext};
use anyhow::Result;

/// Run an engine's service loop in the foreground until an error stops it
///
/// # Errors
///
/// Returns an error if:
/// - Another daemon already runs this engine
/// - The managed root cannot be prepared
/// - The registry is unreadable, at startup or later
pub fn execute(ctx: &VigilContext, kind: EngineKind) -> Result<()> {
    let _instance = InstanceLock::acquire(&ctx.config.state_dir(), kind)?;

    let engine = Engine::open(
        ctx.layout(kind),
        ctx.engine_settings(kind),
        Box::new(WhoCommand::locate()),
    )?;
    let gate = AutostartGate::new(ctx.autostart_lock(kind), ctx.config_path.clone(), kind);

    if !ctx.autostart_lock(kind).exists() || !ctx.config.autostart(kind) {
        crate::output::info(&format!(
            "{kind} autostart is disabled; the loop stays paused until `vigil enable {kind}`"
        ));
    }

    ServiceLoop::new(engine, gate).run()
}
