#[cfg(test)]
pub mod fixtures {
    use crate::{VigilContext, config::Config};
    use anyhow::Result;
    use tempfile::TempDir;

    /// A context whose config, state directory and both managed roots live
    /// inside a fresh temp dir
    pub fn test_context() -> Result<(TempDir, VigilContext)> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("config/config.toml");

        let mut config = Config::default();
        config.core.state_dir = temp_dir.path().join("state");
        config.monitoring.root = temp_dir.path().join("monitoring");
        config.backup.root = temp_dir.path().join("backup");
        config.save(&config_path)?;

        let context = VigilContext {
            config_path,
            config,
        };
        Ok((temp_dir, context))
    }
}
