use crate::VigilContext;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Execute config command to get/set configuration values
///
/// # Errors
///
/// Returns an error if:
/// - Failed to set configuration value
/// - Failed to save configuration
pub fn execute(
    ctx: &mut VigilContext,
    key: Option<&str>,
    value: Option<String>,
    list: bool,
) -> Result<()> {
    // If --list flag is set or no key is provided, show all configuration
    if list || key.is_none() {
        show_all_config(ctx);
        return Ok(());
    }

    let key =
        key.ok_or_else(|| anyhow::anyhow!("Key must be provided when not using --list flag"))?;

    if let Some(val) = value {
        ctx.config.set(key, val.clone())?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Set {key} = {val}"));
    } else if let Some(val) = ctx.config.get(key) {
        println!("{val}");
    } else {
        output::warning(&format!("Unknown configuration key '{key}'"));
    }

    Ok(())
}

/// Show all configuration values
fn show_all_config(ctx: &VigilContext) {
    let sections: [(&str, &[&str]); 3] = [
        ("core", &["state_dir", "poll_interval_secs"]),
        ("monitoring", &["root", "autostart"]),
        ("backup", &["root", "autostart", "stamp"]),
    ];

    for (i, (section, keys)) in sections.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format!("[{section}]").bold());
        for key in *keys {
            if let Some(value) = ctx.config.get(&format!("{section}.{key}")) {
                println!("  {key} = {value}");
            }
        }
    }
}
