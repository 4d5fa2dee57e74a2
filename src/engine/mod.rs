//! The polling engine shared by monitoring and backup.
//!
//! One [`Engine`] value owns everything a daemon process mutates: the
//! registry handle, the current snapshot and the user lookup. Each call to
//! [`Engine::run_cycle`] performs one full cycle:
//!
//! 1. when active, probe every watched file, classify the change and
//!    dispatch the engine's action, routing vanished files to recovery
//! 2. rebuild the snapshot from the registry and the filesystem
//! 3. sweep the managed root for orphaned artifacts
//!
//! [`service::ServiceLoop`] drives cycles forever behind a gate.

pub mod detect;
pub mod dispatch;
pub mod quarantine;
pub mod reconcile;
pub mod service;

pub use detect::{Change, Probe};
pub use reconcile::{Recovery, SweepReport};
pub use service::{Gate, GateState, ServiceLoop};

use crate::config::StampPolicy;
use crate::tracking::{MetadataRecord, Snapshot, TargetRegistry, TrackedPath};
use crate::users::SessionUsers;
use crate::Layout;
use anyhow::{Context, Result};
use dispatch::DispatchContext;
use std::io;
use std::time::Duration;
use tracing::Level;

/// Per-engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Wait between cycles
    pub poll_interval: Duration,
    /// Which instant backup names are stamped with
    pub stamp: StampPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stamp: StampPolicy::default(),
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Whether detection ran this cycle
    pub active: bool,
    /// Log lines appended or backup copies written
    pub dispatched: usize,
    /// Vanished files whose artifacts were quarantined
    pub recovered: usize,
    /// Per-file failures that were logged and skipped
    pub failed: usize,
    /// Outcome of the end-of-cycle sweep
    pub sweep: SweepReport,
}

/// One engine's mutable state
pub struct Engine {
    /// Managed root
    layout: Layout,
    /// Registry handle, reloaded every cycle
    registry: TargetRegistry,
    /// Watched files as of the last rebuild
    snapshot: Snapshot,
    /// Poll interval and stamp policy
    settings: EngineSettings,
    /// Logged-on user lookup for audit lines
    users: Box<dyn SessionUsers>,
}

impl Engine {
    /// Prepare the managed root, load the registry and build the first
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the registry is
    /// unreadable
    pub fn open(
        layout: Layout,
        settings: EngineSettings,
        users: Box<dyn SessionUsers>,
    ) -> Result<Self> {
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)
            .with_context(|| format!("Cannot start the {} engine", layout.kind()))?;
        let snapshot = Snapshot::build(&layout, &mut registry)?;

        tracing::info!(
            engine = %layout.kind(),
            root = %layout.root().display(),
            targets = registry.len(),
            files = snapshot.len(),
            "engine ready"
        );

        Ok(Self {
            layout,
            registry,
            snapshot,
            settings,
            users,
        })
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Returns an error only when the registry becomes unreadable; per-file
    /// failures are logged and counted in the report
    pub fn run_cycle(&mut self, state: GateState) -> Result<CycleReport> {
        let span = tracing::span!(Level::DEBUG, "cycle", engine = %self.layout.kind());
        let _guard = span.enter();

        let mut report = CycleReport {
            active: state == GateState::Active,
            ..CycleReport::default()
        };

        if report.active {
            self.detect_and_dispatch(&mut report);
        }

        self.rebuild()?;
        report.sweep = reconcile::sweep(&self.layout, &self.registry, &self.snapshot);
        Ok(report)
    }

    /// Re-read the registry and rebuild the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or rewritten
    pub fn rebuild(&mut self) -> Result<()> {
        self.registry.reload()?;
        self.snapshot = Snapshot::build(&self.layout, &mut self.registry)?;
        Ok(())
    }

    /// Probe, classify and dispatch every watched file
    fn detect_and_dispatch(&mut self, report: &mut CycleReport) {
        let users = self.users.logged_on();
        let ctx = DispatchContext {
            users: &users,
            now: chrono::Local::now(),
            poll_interval: self.settings.poll_interval,
            stamp: self.settings.stamp,
        };
        let kind = self.layout.kind();

        for path in self.snapshot.paths() {
            let Some(record) = self.snapshot.get_mut(&path) else {
                continue;
            };

            let live = match detect::probe(path.as_path()) {
                Ok(Probe::Present(live)) => live,
                Ok(Probe::Gone) => {
                    recover(&self.layout, &mut self.registry, &path, record, report);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %path.as_path().display(), "probe failed: {e:#}");
                    report.failed += 1;
                    continue;
                }
            };

            let change = detect::classify(record, live);
            match dispatch::dispatch(kind, path.as_path(), record, change, &ctx) {
                Ok(Some(artifact)) => {
                    tracing::debug!(
                        path = %path.as_path().display(),
                        change = change.as_str(),
                        artifact = %artifact.display(),
                        "dispatched"
                    );
                    report.dispatched += 1;
                }
                Ok(None) => {}
                Err(e) if is_not_found(&e) && !path.as_path().exists() => {
                    recover(&self.layout, &mut self.registry, &path, record, report);
                }
                Err(e) => {
                    tracing::warn!(path = %path.as_path().display(), "dispatch failed: {e:#}");
                    report.failed += 1;
                }
            }
        }
    }

    /// Current snapshot
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Registry as of the last rebuild
    #[must_use]
    pub const fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Managed root
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Engine tunables
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

/// Route a vanished file to the reconciler, recording the outcome
fn recover(
    layout: &Layout,
    registry: &mut TargetRegistry,
    path: &TrackedPath,
    record: &MetadataRecord,
    report: &mut CycleReport,
) {
    match reconcile::recover_missing(layout, registry, path.as_path(), record) {
        Ok(Recovery::NothingToDo) => {}
        Ok(_) => report.recovered += 1,
        Err(e) => {
            tracing::warn!(path = %path.as_path().display(), "recovery failed: {e:#}");
            report.failed += 1;
        }
    }
}

/// Whether an error chain bottoms out in a missing file
fn is_not_found(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::layout::EngineKind;
    use crate::users::FixedUsers;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn open(kind: EngineKind, root: &Path) -> Result<Engine> {
        Engine::open(
            Layout::new(kind, root.to_path_buf()),
            EngineSettings::default(),
            Box::new(FixedUsers(vec!["alice".to_string()])),
        )
    }

    #[test]
    fn test_paused_cycle_detects_nothing() -> Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("a.txt");
        fs::write(&file, "a")?;

        let mut engine = open(EngineKind::Monitoring, &temp.path().join("root"))?;
        let mut registry = TargetRegistry::open(engine.layout())?;
        registry.register(&file, "tester")?;
        engine.rebuild()?;

        filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(4_000_000_000, 0))?;
        let report = engine.run_cycle(GateState::Paused)?;
        assert!(!report.active);
        assert_eq!(report.dispatched, 0);
        Ok(())
    }

    #[test]
    fn test_registry_corruption_is_fatal() -> Result<()> {
        let temp = TempDir::new()?;
        let mut engine = open(EngineKind::Backup, &temp.path().join("root"))?;
        fs::write(engine.layout().registry_path(), "[broken")?;
        assert!(engine.run_cycle(GateState::Active).is_err());
        Ok(())
    }

    #[test]
    fn test_not_found_detection_follows_context() {
        let err = anyhow::Error::from(io::Error::from(io::ErrorKind::NotFound))
            .context("Failed to open /x");
        assert!(is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("other")));
    }
}
