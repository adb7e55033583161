//! End-to-end tick cycle scenarios on hand-built causal sites.
//!
//! Each scenario wires a [`CausalGraph`] built from explicit parts through
//! state manager and detector, so every tag and every event can be checked
//! by hand.

// Integration tests use unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use causal_core::{Simulation, SimulationConfig};
use causal_site::CausalGraph;
use causal_types::{NodeId, ParticleId};

// =============================================================================
// Helpers
// =============================================================================

/// One detector cell over everything, no hidden layer, every repeat loops.
fn scenario_config(fusion_mode: &str, q: u32) -> SimulationConfig {
    SimulationConfig::parse(&format!(
        r"
simulation:
  hide_layer_index: null
tags:
  alphabet_size_q: {q}
  fusion_mode: {fusion_mode}
detector:
  grid_size: 1
  min_loop_period: 1
  min_particle_size: 1
"
    ))
    .unwrap()
}

/// layer 0: 0, 1   layer 1: 2 (preds 0, 1), 3 (pred 1)
fn diamond() -> CausalGraph {
    CausalGraph::from_parts(&[2, 2], &[(0, 2), (1, 2), (1, 3)]).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn fixed_point_becomes_a_particle_on_the_second_tick() {
    let mut sim = Simulation::from_graph(diamond(), &scenario_config("sum_mod_q", 3)).unwrap();
    // Initial tags are (id * 173) mod 3.
    assert_eq!(sim.state().tags(), &[0, 2, 1, 0]);

    let first = sim.tick().unwrap();
    assert_eq!(first.tick, 1);
    assert_eq!(sim.state().tags(), &[0, 2, 2, 2]);
    assert!(first.looping.is_empty());
    assert!(first.record.particles.is_empty());
    assert!(first.record.events.is_empty());

    let second = sim.tick().unwrap();
    assert_eq!(sim.state().tags(), &[0, 2, 2, 2]);
    assert_eq!(second.looping_cells(), 1);
    assert_eq!(second.looping.values().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(second.record.events.spawned, vec![ParticleId(0)]);
    let particle = &second.record.particles[0];
    assert_eq!(particle.period, 1);
    assert_eq!(particle.lifetime, 1);
    assert_eq!(particle.num_cells, 1);

    let third = sim.tick().unwrap();
    assert!(third.record.events.is_empty());
    assert_eq!(third.record.particles[0].id, ParticleId(0));
    assert_eq!(third.record.particles[0].lifetime, 2);
}

#[test]
fn disturbed_particle_decays_and_a_new_one_spawns() {
    let mut sim = Simulation::from_graph(diamond(), &scenario_config("sum_mod_q", 3)).unwrap();
    sim.tick().unwrap();
    sim.tick().unwrap();
    assert_eq!(sim.detector().active_count(), 1);

    // Fresh sources: the next state [1, 1, 2, 1] has never been seen.
    sim.state_mut().set_tags(vec![1, 1, 0, 0]).unwrap();
    let disturbed = sim.tick().unwrap();
    assert_eq!(sim.state().tags(), &[1, 1, 2, 1]);
    assert!(disturbed.looping.is_empty());
    assert_eq!(disturbed.record.events.decayed, vec![ParticleId(0)]);
    assert!(disturbed.record.particles.is_empty());

    let settled = sim.tick().unwrap();
    assert_eq!(settled.record.events.spawned, vec![ParticleId(1)]);

    let report = sim.drain();
    assert_eq!(report.final_tick, 4);
    assert_eq!(report.archived.len(), 1);
    assert_eq!(report.archived[0].id, ParticleId(0));
    assert_eq!(report.archived[0].first_seen_tick, 2);
    assert_eq!(report.archived[0].last_seen_tick, 2);
    assert_eq!(report.active.len(), 1);
    assert_eq!(report.active[0].id, ParticleId(1));
}

#[test]
fn period_two_oscillation_is_detected() {
    // 0 -> 1 with self-inclusion over q = 2: node 1 flips every tick while
    // node 0 holds a 1.
    let graph = CausalGraph::from_parts(&[1, 1], &[(0, 1)]).unwrap();
    let mut config = scenario_config("sum_mod_q", 2);
    config.tags.include_self = true;
    let mut sim = Simulation::from_graph(graph, &config).unwrap();
    sim.state_mut().set_tags(vec![1, 0]).unwrap();

    let mut periods = Vec::new();
    for _ in 0..4 {
        let summary = sim.tick().unwrap();
        periods.push(summary.looping.values().next().copied());
    }
    assert_eq!(periods, vec![None, None, Some(2), Some(2)]);
}

#[test]
fn minimum_period_filters_short_loops() {
    let mut config = scenario_config("sum_mod_q", 3);
    config.detector.min_loop_period = 2;
    let mut sim = Simulation::from_graph(diamond(), &config).unwrap();
    for _ in 0..5 {
        let summary = sim.tick().unwrap();
        assert!(summary.looping.is_empty());
        assert!(summary.record.particles.is_empty());
    }
}

#[test]
fn hidden_sources_do_not_affect_the_cell_hash() {
    // Sources [1, 2] leave tags [1, 2, 0, 2]; sources [2, 0] leave
    // [2, 0, 2, 0]. The visible layer holds {0, 2} both times.
    let run = |hide_layer_index| {
        let mut config = scenario_config("sum_mod_q", 3);
        config.simulation.hide_layer_index = hide_layer_index;
        let mut sim = Simulation::from_graph(diamond(), &config).unwrap();
        sim.state_mut().set_tags(vec![1, 2, 0, 0]).unwrap();
        sim.tick().unwrap();
        assert_eq!(sim.state().tags(), &[1, 2, 0, 2]);
        sim.state_mut().set_tags(vec![2, 0, 0, 0]).unwrap();
        let summary = sim.tick().unwrap();
        assert_eq!(sim.state().tags(), &[2, 0, 2, 0]);
        summary.looping_cells()
    };
    assert_eq!(run(Some(0)), 1);
    assert_eq!(run(None), 0);
}

#[test]
fn every_fusion_mode_runs_on_the_same_site() {
    for mode in ["sum_mod_q", "quadratic", "injective"] {
        let mut sim = Simulation::from_graph(diamond(), &scenario_config(mode, 5)).unwrap();
        for tick in 1..=6 {
            let summary = sim.tick().unwrap();
            assert_eq!(summary.tick, tick);
            assert!(sim.state().tags().iter().all(|&t| t < 5));
        }
        // Layer 0 has no inputs and there is no noise: sources never change.
        assert_eq!(sim.state().tag(NodeId(0)), Some(0));
        assert_eq!(sim.state().tag(NodeId(1)), Some(173 % 5));
    }
}
