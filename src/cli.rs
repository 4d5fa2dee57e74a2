//! Command-line interface definitions for vigil.
//!
//! The CLI definitions are shared between the main binary and build tools (like xtask)
//! for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes (#[arg(help = "...")]),
//! so we allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use crate::EngineKind;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for vigil.
#[derive(Parser)]
#[command(
    name = "vigil",
    version = crate::VERSION,
    about = "Polling file monitoring and backup daemon",
    long_about = "Watches registered files and directories, writing an audit log entry \
                  (monitoring) or a timestamped copy (backup) whenever one changes"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output (debug logging for the daemon)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Engine selector accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Audit-log engine
    Monitoring,
    /// Versioned-copy engine
    Backup,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Monitoring => Self::Monitoring,
            EngineArg::Backup => Self::Backup,
        }
    }
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run an engine's polling loop in the foreground
    Run {
        #[arg(value_enum)]
        engine: EngineArg,
    },

    /// Register files or directories with an engine
    Add {
        #[arg(value_enum)]
        engine: EngineArg,

        /// Paths to register
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip paths that cannot be registered instead of failing
        #[arg(short, long)]
        force: bool,
    },

    /// Stop tracking targets by id
    Rm {
        #[arg(value_enum)]
        engine: EngineArg,

        /// Target ids as shown by `vigil list`
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// List registered targets
    List {
        #[arg(value_enum)]
        engine: EngineArg,
    },

    /// Show the monitoring log of a target
    Log {
        /// Target id as shown by `vigil list monitoring`
        id: u64,

        /// Only show the last N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Enable autostart: set the flag and create the lock file
    Enable {
        #[arg(value_enum)]
        engine: EngineArg,
    },

    /// Disable autostart: clear the flag and remove the lock file
    Disable {
        #[arg(value_enum)]
        engine: EngineArg,
    },

    /// Get and set configuration options
    Config {
        /// Configuration key (e.g., backup.stamp)
        key: Option<String>,

        /// Value to set
        value: Option<String>,

        /// List all configuration
        #[arg(short, long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
