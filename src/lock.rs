//! Process-level coordination files.
//!
//! - [`AutostartLock`]: zero-byte marker whose presence, together with the
//!   engine's `autostart` flag, keeps a daemon active
//! - [`AutostartGate`]: the [`Gate`] built from both, re-evaluated every cycle
//! - [`InstanceLock`]: held for the life of `vigil run` so two daemons never
//!   drive the same engine

use crate::EngineKind;
use crate::config::Config;
use crate::engine::{Gate, GateState};
use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The autostart marker file of one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutostartLock {
    /// Marker location
    path: PathBuf,
}

impl AutostartLock {
    /// Marker for `kind` inside `state_dir`
    #[must_use]
    pub fn new(state_dir: &Path, kind: EngineKind) -> Self {
        Self {
            path: state_dir.join(kind.lock_file_name()),
        }
    }

    /// Marker location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the marker is present
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the marker (and its directory)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created
    pub fn create(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("Failed to create lock file: {}", self.path.display()))?;
        Ok(())
    }

    /// Delete the marker, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove lock file: {}", self.path.display())),
        }
    }
}

/// Active when the marker exists and the config enables autostart.
///
/// The config file is re-read on every evaluation so `vigil enable` and
/// `vigil disable` take effect on a running daemon within one cycle.
#[derive(Debug, Clone)]
pub struct AutostartGate {
    /// Marker file
    lock: AutostartLock,
    /// Config file holding the autostart flag
    config_path: PathBuf,
    /// Engine whose flag is read
    kind: EngineKind,
}

impl AutostartGate {
    /// Gate for `kind` reading its flag from `config_path`
    #[must_use]
    pub const fn new(lock: AutostartLock, config_path: PathBuf, kind: EngineKind) -> Self {
        Self {
            lock,
            config_path,
            kind,
        }
    }
}

impl Gate for AutostartGate {
    fn state(&self) -> GateState {
        if !self.lock.exists() {
            return GateState::Paused;
        }
        match Config::read(&self.config_path) {
            Ok(config) if config.autostart(self.kind) => GateState::Active,
            Ok(_) => GateState::Paused,
            Err(e) => {
                tracing::warn!("cannot read autostart flag, staying paused: {e:#}");
                GateState::Paused
            }
        }
    }
}

/// Exclusive lock held by a running daemon
///
/// The lock is released when this value is dropped.
pub struct InstanceLock {
    /// Locked file handle
    lock_file: File,
    /// Path to the lock file (for cleanup)
    lock_path: PathBuf,
}

impl InstanceLock {
    /// Take the instance lock of `kind` inside `state_dir` without waiting
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The state directory or lock file cannot be created
    /// - Another daemon already holds the lock
    pub fn acquire(state_dir: &Path, kind: EngineKind) -> Result<Self> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;
        let lock_path = state_dir.join(format!("{}.pid", kind.as_str()));

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) | Err(_) => bail!(
                "Another {kind} daemon is already running (lock held on {})",
                lock_path.display()
            ),
        }

        // Record who holds the lock for debugging
        file.set_len(0)?;
        let mut file_ref = &file;
        let _ = writeln!(
            file_ref,
            "pid={}\nstarted={}",
            std::process::id(),
            humantime::format_rfc3339(SystemTime::now())
        );

        Ok(Self {
            lock_file: file,
            lock_path,
        })
    }

    /// Lock file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(
                "Failed to remove lock file during cleanup {}: {e}",
                self.lock_path.display()
            );
        }
    }
}
