//! Simulation loop runner.
//!
//! This module provides [`run_simulation`], which drives the tick loop
//! until one of these conditions is met:
//!
//! - **Bounded run**: `total_ticks` ticks have completed
//! - **Operator stop**: the shared [`StopSignal`] was raised
//!
//! After every tick the runner hands the summary to a [`TickCallback`]
//! (the engine uses one to append the tick log), and every `log_interval`
//! ticks it emits the console summary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::tick::{Simulation, TickError, TickSummary};

/// Errors raised by a tick callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// Writing callback output failed.
    #[error("callback I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The callback could not process the tick.
    #[error("callback failed: {reason}")]
    Failed {
        /// Explanation of the failure.
        reason: String,
    },
}

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// The tick callback failed.
    #[error("callback error at tick {tick}: {source}")]
    Callback {
        /// The tick whose callback failed.
        tick: u64,
        /// The underlying callback error.
        source: CallbackError,
    },
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// The configured number of ticks completed.
    MaxTicksReached,
    /// The stop signal was raised.
    OperatorStop,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Loop bounds and logging cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of ticks to run.
    pub total_ticks: u64,
    /// Ticks between console summaries (0 disables them).
    pub log_interval: u64,
}

impl RunOptions {
    /// Read the run bounds from a configuration.
    pub const fn from_config(config: &SimulationConfig) -> Self {
        Self {
            total_ticks: config.simulation.total_ticks,
            log_interval: config.simulation.log_interval,
        }
    }
}

/// Shared flag asking the run loop to stop before its next tick.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Callback invoked after each tick completes.
pub trait TickCallback {
    /// Called after a tick completes successfully.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the run with [`RunnerError::Callback`].
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation)
    -> Result<(), CallbackError>;
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(
        &mut self,
        _summary: &TickSummary,
        _simulation: &Simulation,
    ) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// Run the simulation loop until a termination condition is met.
///
/// The stop signal is checked before every tick, so a raised signal never
/// interrupts a tick halfway.
///
/// # Errors
///
/// Returns [`RunnerError::Tick`] if a tick fails and
/// [`RunnerError::Callback`] if the callback rejects a tick.
pub fn run_simulation(
    simulation: &mut Simulation,
    options: &RunOptions,
    stop: &StopSignal,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        total_ticks = options.total_ticks,
        log_interval = options.log_interval,
        "Simulation starting"
    );

    while total_ticks < options.total_ticks {
        if stop.is_stop_requested() {
            info!(tick = simulation.current_tick(), "Operator stop requested");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::OperatorStop,
                final_summary: last_summary,
                total_ticks,
            });
        }

        let summary = simulation.tick()?;
        total_ticks = total_ticks.saturating_add(1);

        callback
            .on_tick(&summary, simulation)
            .map_err(|source| RunnerError::Callback {
                tick: summary.tick,
                source,
            })?;

        if summary.tick.checked_rem(options.log_interval) == Some(0) {
            log_tick_summary(&summary);
        }
        last_summary = Some(summary);
    }

    info!(
        tick = simulation.current_tick(),
        total_ticks, "Tick limit reached"
    );
    Ok(SimulationResult {
        end_reason: SimulationEndReason::MaxTicksReached,
        final_summary: last_summary,
        total_ticks,
    })
}

/// Emit the periodic console summary.
pub fn log_tick_summary(summary: &TickSummary) {
    let looping = summary.looping_cells();
    let active = summary.active_particles();
    info!(
        tick = summary.tick,
        looping_cells = looping,
        active_particles = active,
        "Tick {}: {} looping cells, {} active particles.",
        summary.tick,
        looping,
        active
    );
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            looping_cells = summary.looping_cells(),
            active_particles = summary.active_particles(),
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}
