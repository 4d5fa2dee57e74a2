//! The daemon loop.

use crate::engine::{CycleReport, Engine};
use anyhow::Result;

/// Whether detection runs in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Detect, dispatch, rebuild, sweep
    Active,
    /// Rebuild and sweep only
    Paused,
}

/// Decides, once per cycle, whether the engine is active
pub trait Gate {
    /// Current state; consulted at the start of every cycle
    fn state(&self) -> GateState;
}

impl<F> Gate for F
where
    F: Fn() -> GateState,
{
    fn state(&self) -> GateState {
        self()
    }
}

/// Runs an engine forever behind a gate
pub struct ServiceLoop<G: Gate> {
    /// Engine being driven
    engine: Engine,
    /// Active/paused decision source
    gate: G,
    /// State seen in the previous cycle, for transition logging
    last_state: Option<GateState>,
}

impl<G: Gate> ServiceLoop<G> {
    /// Wrap an opened engine
    #[must_use]
    pub const fn new(engine: Engine, gate: G) -> Self {
        Self {
            engine,
            gate,
            last_state: None,
        }
    }

    /// Run a single cycle using the gate's current state
    ///
    /// # Errors
    ///
    /// Returns an error if the registry becomes unreadable
    pub fn tick(&mut self) -> Result<CycleReport> {
        let state = self.gate.state();
        if self.last_state != Some(state) {
            match state {
                GateState::Active => tracing::info!(engine = %self.engine.layout().kind(), "detection active"),
                GateState::Paused => tracing::info!(engine = %self.engine.layout().kind(), "detection paused"),
            }
            self.last_state = Some(state);
        }
        self.engine.run_cycle(state)
    }

    /// Cycle and sleep until an error stops the loop. Never returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry becomes unreadable
    pub fn run(mut self) -> Result<()> {
        let interval = self.engine.settings().poll_interval;
        tracing::info!(
            engine = %self.engine.layout().kind(),
            interval = %humantime::format_duration(interval),
            "service loop started"
        );

        loop {
            let report = self.tick()?;
            if report.dispatched > 0 || report.recovered > 0 || report.failed > 0 {
                tracing::info!(
                    dispatched = report.dispatched,
                    recovered = report.recovered,
                    failed = report.failed,
                    swept = report.sweep.moved.len(),
                    "cycle complete"
                );
            } else {
                tracing::trace!(swept = report.sweep.moved.len(), "cycle complete");
            }
            std::thread::sleep(interval);
        }
    }

    /// Engine being driven
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }
}
