//! Configuration, update functor, tick cycle, and run loop for the causal
//! site simulation.
//!
//! This crate owns the two-phase tick that drives the simulation: the state
//! manager applies the update functor to every node, then the particle
//! detector observes the committed tag vector.
//!
//! # Modules
//!
//! - [`clock`] -- Monotonic tick counter.
//! - [`config`] -- Configuration loading from `causal-config.yaml` into
//!   strongly-typed structs.
//! - [`fusion`] -- [`FusionRule`], the three tag fusion rules.
//! - [`hidden`] -- Drifting affine clocks for a clock-driven hidden layer.
//! - [`state`] -- [`StateManager`], the double-buffered tag vector and
//!   memory density.
//! - [`tick`] -- [`Simulation`], the owned context advanced one tick at a
//!   time.
//! - [`runner`] -- [`run_simulation`], the bounded loop with callbacks and
//!   operator stop.
//!
//! [`FusionRule`]: fusion::FusionRule
//! [`StateManager`]: state::StateManager
//! [`Simulation`]: tick::Simulation
//! [`run_simulation`]: runner::run_simulation

pub mod clock;
pub mod config;
pub mod fusion;
pub mod hidden;
pub mod runner;
pub mod state;
pub mod tick;

pub use config::{ConfigError, SimulationConfig};
pub use fusion::FusionRule;
pub use hidden::HiddenClocks;
pub use runner::{
    CallbackError, NoOpCallback, RunOptions, RunnerError, SimulationEndReason, SimulationResult,
    StopSignal, TickCallback, log_simulation_end, run_simulation,
};
pub use state::{StateError, StateManager, StateParams};
pub use tick::{Simulation, SimulationReport, TickError, TickSummary};
