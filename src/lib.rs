#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![allow(clippy::arithmetic_side_effects)] // Simple counters cannot overflow

//! # Vigil - Polling File Monitoring and Backup Daemon
//!
//! Vigil keeps watch over a set of registered files and directories. Two
//! independent engines share one polling architecture:
//!
//! - **Monitoring** appends an audit line to a per-target log whenever a
//!   tracked file is accessed or modified.
//! - **Backup** writes a timestamped copy of a tracked file into a central
//!   backup store whenever it is modified.
//!
//! ## Architecture
//!
//! - [`tracking`]: the JSON target registry, the per-cycle metadata snapshot,
//!   and artifact naming
//! - [`engine`]: change detection, action dispatch, orphan reconciliation and
//!   the service loop
//! - [`lock`]: the autostart lock file and the gate that pauses the loop
//! - [`users`]: logged-on user lookup for audit lines
//! - [`config`]: the properties store (TOML)
//! - [`commands`]: CLI command implementations
//!
//! ## Example Usage
//!
//! ```no_run
//! use vigil::{EngineKind, VigilContext};
//! use vigil::engine::Engine;
//! use vigil::users::WhoCommand;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = VigilContext::new()?;
//! let mut engine = Engine::open(
//!     ctx.layout(EngineKind::Backup),
//!     ctx.engine_settings(EngineKind::Backup),
//!     Box::new(WhoCommand::locate()),
//! )?;
//! let report = engine.run_cycle(vigil::engine::GateState::Active)?;
//! println!("{} backups written", report.dispatched);
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Change detection, dispatch, reconciliation and the polling loop.
pub mod engine;

/// Autostart lock file and the service gate built on it.
pub mod lock;

/// Output formatting for interactive commands.
pub mod output;

/// Tracked target registry, metadata snapshot and artifact layout.
pub mod tracking;

/// Logged-on user retrieval.
pub mod users;

/// Utility functions and helpers.
pub mod utils;

#[cfg(test)]
pub mod test_utils;

use anyhow::{Context, Result};
use std::path::PathBuf;

pub use tracking::layout::{EngineKind, Layout};

/// Current version of the vigil binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path relative to home directory.
pub const DEFAULT_CONFIG_PATH: &str = ".config/vigil/config.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "VIGIL_CONFIG_PATH";

/// Central context for all Vigil operations.
///
/// Holds the loaded properties store and knows how to derive the managed
/// layout, autostart lock and engine settings for either engine.
///
/// # Examples
///
/// ```no_run
/// use vigil::VigilContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Default location (or $VIGIL_CONFIG_PATH)
/// let ctx = VigilContext::new()?;
///
/// // Explicit location, used by tests
/// let ctx = VigilContext::new_explicit("/tmp/vigil/config.toml".into())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VigilContext {
    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl VigilContext {
    /// Creates a new `VigilContext` by loading the configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined or if the configuration
    /// file cannot be read or created.
    pub fn new() -> Result<Self> {
        let config_path = if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            let home = dirs::home_dir().context("Could not find home directory")?;
            home.join(DEFAULT_CONFIG_PATH)
        };

        Self::new_explicit(config_path)
    }

    /// Creates a new `VigilContext` from an explicit configuration path.
    ///
    /// A default configuration is written when the file does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(config_path: PathBuf) -> Result<Self> {
        let config = config::Config::load(&config_path)?;

        let validator = config::validator::ConfigValidator::new();
        if let Err(e) = validator.validate_config_file(&config_path) {
            tracing::warn!("Configuration validation failed: {e}");
        }

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Managed root layout for an engine.
    #[must_use]
    pub fn layout(&self, kind: EngineKind) -> Layout {
        Layout::new(kind, self.config.root(kind))
    }

    /// Autostart lock file for an engine.
    #[must_use]
    pub fn autostart_lock(&self, kind: EngineKind) -> lock::AutostartLock {
        lock::AutostartLock::new(&self.config.state_dir(), kind)
    }

    /// Polling and naming settings for an engine.
    #[must_use]
    pub fn engine_settings(&self, kind: EngineKind) -> engine::EngineSettings {
        engine::EngineSettings {
            poll_interval: self.config.poll_interval(),
            stamp: match kind {
                EngineKind::Monitoring => config::StampPolicy::default(),
                EngineKind::Backup => self.config.backup.stamp,
            },
        }
    }
}
