//! Simulation binary for the causal site.
//!
//! This is the main entry point that wires configuration, the tick loop,
//! and the output files together.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `causal-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Generate the causal site and build state and detector
//! 4. Write the static graph document
//! 5. Run the tick loop, appending every tick to the JSONL log
//! 6. Log the final particle report

mod error;
mod export;

use std::path::{Path, PathBuf};

use causal_core::runner::{self, NoOpCallback, RunOptions, StopSignal};
use causal_core::{Simulation, SimulationConfig, SimulationReport};
use causal_types::ArchivedParticle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::export::{JsonlLogCallback, output_paths, write_static_graph};

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "causal-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, generation, the run, or output
/// writing fails.
fn main() -> Result<(), EngineError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;
    init_tracing(&config.logging)?;

    info!(
        path = %config_path.display(),
        from_file,
        seed = config.simulation.seed,
        total_ticks = config.simulation.total_ticks,
        fusion_mode = %config.tags.fusion_mode,
        q = config.tags.alphabet_size_q,
        "Configuration loaded"
    );

    let stop = StopSignal::new();
    let report = run(&config, &stop)?;
    log_final_report(&report);

    info!(final_tick = report.final_tick, "causal-engine shutdown complete");
    Ok(())
}

/// Load the configuration, falling back to defaults when the file is
/// missing. Returns the configuration and whether it came from the file.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides()?;
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &causal_core::config::LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|err| EngineError::Logging {
            message: err.to_string(),
        })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| EngineError::Logging {
        message: err.to_string(),
    })
}

/// Build the simulation, write the outputs, and run the loop to the end.
fn run(config: &SimulationConfig, stop: &StopSignal) -> Result<SimulationReport, EngineError> {
    let mut simulation = Simulation::create(config)?;
    let options = RunOptions::from_config(config);

    let result = if let Some((static_path, log_path)) = output_paths(config) {
        write_static_graph(&static_path, &simulation.static_graph())?;
        let mut log = JsonlLogCallback::create(&log_path)?;
        let result = runner::run_simulation(&mut simulation, &options, stop, &mut log)?;
        let lines = log.lines();
        log.finish().map_err(|source| EngineError::Io {
            path: log_path.clone(),
            source,
        })?;
        info!(path = %log_path.display(), lines, "Tick log written");
        result
    } else {
        info!("Output disabled, running without files");
        runner::run_simulation(&mut simulation, &options, stop, &mut NoOpCallback)?
    };

    runner::log_simulation_end(&result);
    Ok(simulation.drain())
}

/// Log particle counts and the longest-lived archived particle.
fn log_final_report(report: &SimulationReport) {
    info!(
        final_tick = report.final_tick,
        active_particles = report.active.len(),
        archived_particles = report.archived.len(),
        "Final report: {} active particles, {} archived particles.",
        report.active.len(),
        report.archived.len()
    );

    match report.longest_lived() {
        Some(particle) => log_particle("Longest-lived archived particle", particle),
        None => warn!("No particle decayed during the run"),
    }
    for particle in &report.active {
        log_particle("Active particle", particle);
    }
}

fn log_particle(message: &str, particle: &ArchivedParticle) {
    info!(
        id = %particle.id,
        period = particle.period,
        lifetime = particle.lifetime,
        first_seen_tick = particle.first_seen_tick,
        last_seen_tick = particle.last_seen_tick,
        peak_cells = particle.peak_cells,
        "{message}"
    );
}
