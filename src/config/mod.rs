//! The properties store: where the managed roots live, how often the engines
//! poll, and whether each engine is enabled for autostart.

pub mod validator;

use crate::EngineKind;
use crate::utils::paths::expand_tilde;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the autostart lock files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitoring_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default)]
    pub stamp: StampPolicy,
}

/// Which instant a backup file name is stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StampPolicy {
    /// The file's own modification time as observed by the detector
    #[default]
    Modified,
    /// Detection time minus one poll interval
    Backdated,
}

impl StampPolicy {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Backdated => "backdated",
        }
    }
}

impl std::str::FromStr for StampPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "modified" => Ok(Self::Modified),
            "backdated" => Ok(Self::Backdated),
            _ => Err(anyhow::anyhow!(
                "Invalid stamp policy: {value} (expected 'modified' or 'backdated')"
            )),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            root: default_monitoring_root(),
            autostart: false,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: default_backup_root(),
            autostart: false,
            stamp: StampPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot read or parse the configuration file
    /// - Configuration file contains invalid TOML
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            // Create default config if it doesn't exist
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        Self::read(path)
    }

    /// Read an existing configuration file without creating one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, not valid TOML, or
    /// sets a zero poll interval.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        if config.core.poll_interval_secs == 0 {
            anyhow::bail!(
                "Invalid config file {}: core.poll_interval_secs must be at least 1",
                path.display()
            );
        }
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let toml_str = toml::to_string_pretty(self)?;
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp.write_all(toml_str.as_bytes())?;
        temp.as_file().sync_all()?;

        // Readers see either the old file or the new one, never a partial write
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace config file: {}", path.display()))?;
        Ok(())
    }

    /// Managed root of an engine, with `~` expanded.
    #[must_use]
    pub fn root(&self, kind: EngineKind) -> PathBuf {
        let root = match kind {
            EngineKind::Monitoring => &self.monitoring.root,
            EngineKind::Backup => &self.backup.root,
        };
        expand_tilde(root).unwrap_or_else(|_| root.clone())
    }

    /// Lock file directory, with `~` expanded.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        expand_tilde(&self.core.state_dir).unwrap_or_else(|_| self.core.state_dir.clone())
    }

    /// Whether an engine is enabled for autostart.
    #[must_use]
    pub const fn autostart(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Monitoring => self.monitoring.autostart,
            EngineKind::Backup => self.backup.autostart,
        }
    }

    /// Enable or disable autostart for an engine.
    pub const fn set_autostart(&mut self, kind: EngineKind, enabled: bool) {
        match kind {
            EngineKind::Monitoring => self.monitoring.autostart = enabled,
            EngineKind::Backup => self.backup.autostart = enabled,
        }
    }

    /// Fixed wait between two poll cycles.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.core.poll_interval_secs)
    }

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return None;
        }

        match (parts[0], parts[1]) {
            ("core", "state_dir") => Some(self.core.state_dir.display().to_string()),
            ("core", "poll_interval_secs") => Some(self.core.poll_interval_secs.to_string()),
            ("monitoring", "root") => Some(self.monitoring.root.display().to_string()),
            ("monitoring", "autostart") => Some(self.monitoring.autostart.to_string()),
            ("backup", "root") => Some(self.backup.root.display().to_string()),
            ("backup", "autostart") => Some(self.backup.autostart.to_string()),
            ("backup", "stamp") => Some(self.backup.stamp.as_str().to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key format is invalid (must be section.key)
    /// - The key is unknown
    /// - The value is invalid for the key (zero interval, relative root,
    ///   roots that collide)
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(anyhow::anyhow!("Invalid configuration key: {key}"));
        }

        match (parts[0], parts[1]) {
            ("core", "state_dir") => {
                self.core.state_dir = parse_root(&value)?;
            }
            ("core", "poll_interval_secs") => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                if secs == 0 {
                    return Err(anyhow::anyhow!("Poll interval must be at least 1 second"));
                }
                self.core.poll_interval_secs = secs;
            }
            ("monitoring", "root") => {
                let root = parse_root(&value)?;
                self.ensure_distinct_roots(&root, &self.backup.root)?;
                self.monitoring.root = root;
            }
            ("monitoring", "autostart") => {
                self.monitoring.autostart = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            ("backup", "root") => {
                let root = parse_root(&value)?;
                self.ensure_distinct_roots(&root, &self.monitoring.root)?;
                self.backup.root = root;
            }
            ("backup", "autostart") => {
                self.backup.autostart = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            ("backup", "stamp") => self.backup.stamp = value.parse()?,
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }

    /// Reject a root equal to, or nested within, the other engine's root.
    fn ensure_distinct_roots(&self, root: &Path, other: &Path) -> Result<()> {
        let root = expand_tilde(root)?;
        let other = expand_tilde(other)?;
        if root.starts_with(&other) || other.starts_with(&root) {
            anyhow::bail!(
                "Monitoring and backup roots must not overlap: {} and {}",
                root.display(),
                other.display()
            );
        }
        Ok(())
    }
}

/// Parse a root directory value; must be absolute once `~` is expanded.
fn parse_root(value: &str) -> Result<PathBuf> {
    let path = PathBuf::from(value);
    if !expand_tilde(&path)?.is_absolute() {
        anyhow::bail!("Path must be absolute: {value}");
    }
    Ok(path)
}

// Default functions for serde
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vigil")
}

fn default_state_dir() -> PathBuf {
    default_data_dir()
}

fn default_monitoring_root() -> PathBuf {
    default_data_dir().join("monitoring")
}

fn default_backup_root() -> PathBuf {
    default_data_dir().join("backup")
}

const fn default_poll_interval_secs() -> u64 {
    5
}
