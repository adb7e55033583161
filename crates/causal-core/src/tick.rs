//! Tick cycle: the owned simulation context.
//!
//! A [`Simulation`] is created once from a configuration, advanced one tick
//! at a time, and finally drained into a [`SimulationReport`]. Each tick
//! runs two phases:
//!
//! 1. **Update** -- the state manager applies the update functor and swaps
//!    its buffers.
//! 2. **Detect** -- the detector reads the committed tag vector, updates
//!    cell histories, and tracks particles.
//!
//! Every `output.memory_density_interval` ticks the record also carries a
//! snapshot of the per-node memory density.
//!
//! The tick is deterministic given the configuration.

use std::collections::BTreeMap;

use causal_detector::{DetectorError, ParticleDetector};
use causal_site::{CausalGraph, CellGrid, SiteError, compute_positions, generate};
use causal_types::{ArchivedParticle, CellId, StaticGraph, TickRecord, Vec3};
use tracing::info;

use crate::config::{ConfigError, SimulationConfig};
use crate::state::{StateError, StateManager};

/// Errors that can occur while creating or advancing a simulation.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The configuration is invalid.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// Graph generation or partitioning failed.
    #[error("site error: {source}")]
    Site {
        /// The underlying site error.
        #[from]
        source: SiteError,
    },

    /// The state manager failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },

    /// The detector failed.
    #[error("detector error: {source}")]
    Detector {
        /// The underlying detector error.
        #[from]
        source: DetectorError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Looping cells and their periods.
    pub looping: BTreeMap<CellId, u64>,
    /// The tick log record.
    pub record: TickRecord,
}

impl TickSummary {
    /// Number of looping cells.
    pub fn looping_cells(&self) -> usize {
        self.looping.len()
    }

    /// Number of live particles after this tick.
    pub fn active_particles(&self) -> usize {
        self.record.particles.len()
    }
}

/// Final state of a drained simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// Last executed tick.
    pub final_tick: u64,
    /// Particles still alive at the end.
    pub active: Vec<ArchivedParticle>,
    /// Particles that decayed during the run (bounded by the archive size).
    pub archived: Vec<ArchivedParticle>,
}

impl SimulationReport {
    /// The archived particle with the longest lifetime; the earliest
    /// decayed wins ties.
    pub fn longest_lived(&self) -> Option<&ArchivedParticle> {
        self.archived
            .iter()
            .rev()
            .max_by_key(|particle| particle.lifetime)
    }
}

/// The owned simulation context.
#[derive(Debug, Clone)]
pub struct Simulation {
    graph: CausalGraph,
    positions: Vec<Vec3>,
    state: StateManager,
    detector: ParticleDetector,
    memory_density_interval: u64,
}

impl Simulation {
    /// Validate `config`, generate the site, and build state and detector.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Config`] for an invalid configuration and
    /// [`TickError::Site`] when generation fails.
    pub fn create(config: &SimulationConfig) -> Result<Self, TickError> {
        config.validate()?;
        let graph = generate(&config.generator_params())?;
        Self::from_graph(graph, config)
    }

    /// Build a simulation around an existing graph. The generation section
    /// of `config` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the cell grid, state manager, or detector
    /// rejects its parameters.
    pub fn from_graph(graph: CausalGraph, config: &SimulationConfig) -> Result<Self, TickError> {
        let positions = compute_positions(&graph, &config.layout_params());
        let cells = CellGrid::build(&graph, &positions, &config.cell_grid_params())?;
        let state = StateManager::new(&graph, &config.state_params())?;
        let occupied = cells.len();
        let detector = ParticleDetector::new(cells, config.detector_params())?;

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            layers = graph.layer_count(),
            cells = occupied,
            fusion_mode = %config.tags.fusion_mode,
            q = config.tags.alphabet_size_q,
            "simulation initialized"
        );
        Ok(Self {
            graph,
            positions,
            state,
            detector,
            memory_density_interval: config.output.memory_density_interval,
        })
    }

    /// Execute one tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::State`] on clock overflow and
    /// [`TickError::Detector`] if the detector rejects the tag vector.
    pub fn tick(&mut self) -> Result<TickSummary, TickError> {
        let tick = self.state.tick(&self.graph)?;
        let detection = self.detector.observe(tick, self.state.tags())?;
        let mut record = detection.record;
        if tick.checked_rem(self.memory_density_interval) == Some(0) {
            record.memory_density = Some(self.state.memory_density().to_vec());
        }
        Ok(TickSummary {
            tick,
            looping: detection.looping,
            record,
        })
    }

    /// The static graph document for visualizers.
    pub fn static_graph(&self) -> StaticGraph {
        causal_site::static_graph(&self.graph, &self.positions, self.detector.grid())
    }

    /// The causal graph.
    pub const fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    /// Node positions, indexed by node ID.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// The state manager.
    pub const fn state(&self) -> &StateManager {
        &self.state
    }

    /// Mutable access to the state manager, for seeding scenarios.
    pub const fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    /// The particle detector.
    pub const fn detector(&self) -> &ParticleDetector {
        &self.detector
    }

    /// Number of completed ticks.
    pub const fn current_tick(&self) -> u64 {
        self.state.tick_count()
    }

    /// Consume the simulation and summarize its particles.
    pub fn drain(self) -> SimulationReport {
        SimulationReport {
            final_tick: self.state.tick_count(),
            active: self.detector.active_summaries(),
            archived: self.detector.archived().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn small_config() -> SimulationConfig {
        SimulationConfig::parse(
            r"
simulation:
  seed: 3
causal_site:
  layers: 6
  avg_nodes_per_layer: 6
  node_count: fixed
  edge_probability: 0.4
tags:
  alphabet_size_q: 4
  fusion_mode: sum_mod_q
detector:
  grid_size: 3
  min_loop_period: 1
  min_particle_size: 1
",
        )
        .unwrap()
    }

    #[test]
    fn create_rejects_invalid_config() {
        let mut config = small_config();
        config.tags.alphabet_size_q = 1;
        assert!(matches!(
            Simulation::create(&config),
            Err(TickError::Config { .. })
        ));
    }

    #[test]
    fn ticks_count_from_one() {
        let mut sim = Simulation::create(&small_config()).unwrap();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.tick().unwrap().tick, 1);
        assert_eq!(sim.tick().unwrap().tick, 2);
        assert_eq!(sim.current_tick(), 2);
    }

    #[test]
    fn summary_counts_match_the_record() {
        let mut sim = Simulation::create(&small_config()).unwrap();
        for _ in 0..10 {
            let summary = sim.tick().unwrap();
            assert_eq!(summary.record.tick, summary.tick);
            assert_eq!(summary.active_particles(), sim.detector().active_count());
        }
    }

    #[test]
    fn static_graph_matches_the_site() {
        let sim = Simulation::create(&small_config()).unwrap();
        let export = sim.static_graph();
        assert_eq!(export.nodes.len(), sim.graph().node_count());
        assert_eq!(export.edges.len(), sim.graph().edge_count());
        assert_eq!(export.grid_size, 3);
    }

    #[test]
    fn memory_density_snapshots_follow_the_interval() {
        let mut config = small_config();
        config.output.memory_density_interval = 3;
        let mut sim = Simulation::create(&config).unwrap();
        for _ in 0..7 {
            let summary = sim.tick().unwrap();
            match summary.record.memory_density {
                Some(density) => {
                    assert_eq!(summary.tick % 3, 0);
                    assert_eq!(density, sim.state().memory_density());
                    assert_eq!(density.len(), sim.graph().node_count());
                }
                None => assert_ne!(summary.tick % 3, 0),
            }
        }

        config.output.memory_density_interval = 0;
        let mut quiet = Simulation::create(&config).unwrap();
        for _ in 0..4 {
            assert!(quiet.tick().unwrap().record.memory_density.is_none());
        }
    }

    #[test]
    fn drain_reports_final_tick() {
        let mut sim = Simulation::create(&small_config()).unwrap();
        for _ in 0..5 {
            sim.tick().unwrap();
        }
        let active = sim.detector().active_count();
        let report = sim.drain();
        assert_eq!(report.final_tick, 5);
        assert_eq!(report.active.len(), active);
    }

    #[test]
    fn longest_lived_prefers_the_earliest_on_ties() {
        let particle = |id, lifetime| ArchivedParticle {
            id: causal_types::ParticleId(id),
            period: 1,
            first_seen_tick: 1,
            last_seen_tick: lifetime,
            lifetime,
            peak_cells: 1,
            track: Vec::new(),
        };
        let report = SimulationReport {
            final_tick: 10,
            active: Vec::new(),
            archived: vec![particle(0, 2), particle(1, 5), particle(2, 5)],
        };
        assert_eq!(report.longest_lived().unwrap().id.0, 1);
        assert!(
            SimulationReport {
                archived: Vec::new(),
                ..report
            }
            .longest_lived()
            .is_none()
        );
    }
}
