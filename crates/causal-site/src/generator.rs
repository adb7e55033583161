//! Seeded generation of the layered causal graph.
//!
//! # Algorithm
//!
//! 1. Draw a node count per layer (Poisson around the configured average,
//!    or exactly the average in fixed mode). A Poisson draw of 0 is raised
//!    to 1 so every layer can feed the next one.
//! 2. For each node of layer `l > 0`, visit candidate predecessors in the
//!    lookback window, closest layer first, ascending ID within a layer.
//!    One uniform draw is consumed per candidate, whether or not the cap
//!    lets the edge through, so the random stream never depends on cap
//!    outcomes.
//! 3. Repair pass: every node above layer 0 left without predecessors is
//!    joined to the first eligible candidate in the same visiting order.
//!    Under a successor cap every candidate may already be full; the repair
//!    then moves one edge of the first candidate whose successor keeps
//!    another predecessor, so out-degrees never grow past the cap.
//!
//! # Determinism
//!
//! A single [`StdRng`] seeded from `seed` drives every draw, in a fixed
//! order. The same parameters always produce the same graph.

use causal_types::{DegreeCap, NodeCountMode, NodeId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use tracing::{debug, info, warn};

use crate::error::SiteError;
use crate::graph::CausalGraph;

/// Parameters of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParams {
    /// Number of layers (at least 1).
    pub layers: u32,
    /// Mean node count per layer.
    pub avg_nodes_per_layer: f64,
    /// How node counts are drawn.
    pub node_count: NodeCountMode,
    /// Probability of each candidate edge, in `[0, 1]`.
    pub edge_probability: f64,
    /// Divide the edge probability by the layer distance.
    pub edge_distance_decay: bool,
    /// How many layers back a predecessor may sit (at least 1).
    pub max_lookback_layers: u32,
    /// Edge count bound for the capped endpoint (`max_out_degree_R`).
    pub max_degree: u32,
    /// Which endpoint the bound applies to.
    pub degree_cap: DegreeCap,
    /// Seed for the generation RNG.
    pub seed: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            layers: 50,
            avg_nodes_per_layer: 40.0,
            node_count: NodeCountMode::Poisson,
            edge_probability: 0.1,
            edge_distance_decay: false,
            max_lookback_layers: 1,
            max_degree: 2,
            degree_cap: DegreeCap::Predecessors,
            seed: 42,
        }
    }
}

impl GeneratorParams {
    /// Check every parameter range.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::InvalidParameters`] naming the first bad parameter.
    pub fn validate(&self) -> Result<(), SiteError> {
        if self.layers == 0 {
            return Err(invalid("layers", "must be at least 1"));
        }
        if !self.avg_nodes_per_layer.is_finite() || self.avg_nodes_per_layer < 0.0 {
            return Err(invalid(
                "avg_nodes_per_layer",
                "must be a finite, non-negative number",
            ));
        }
        if self.node_count == NodeCountMode::Poisson && self.avg_nodes_per_layer <= 0.0 {
            return Err(invalid(
                "avg_nodes_per_layer",
                "must be positive for poisson node counts",
            ));
        }
        if !(0.0..=1.0).contains(&self.edge_probability) {
            return Err(invalid("edge_probability", "must lie in [0, 1]"));
        }
        if self.max_lookback_layers == 0 {
            return Err(invalid("max_lookback_layers", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(parameter: &'static str, reason: &str) -> SiteError {
    SiteError::InvalidParameters {
        parameter,
        reason: reason.to_owned(),
    }
}

/// Generate a causal graph.
///
/// # Errors
///
/// Returns [`SiteError::InvalidParameters`] for out-of-range parameters,
/// [`SiteError::TooManyNodes`] if the drawn sizes overflow the ID space, and
/// [`SiteError::RepairImpossible`] when a node above layer 0 cannot receive
/// a predecessor.
pub fn generate(params: &GeneratorParams) -> Result<CausalGraph, SiteError> {
    params.validate()?;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let sizes = draw_layer_sizes(params, &mut rng)?;
    let mut graph = CausalGraph::with_layer_sizes(&sizes)?;
    let mut degrees = DegreeCounter::new(graph.node_count(), params);

    let drawn = assign_random_edges(&mut graph, &mut degrees, params, &mut rng);
    let repaired = repair_isolated(&mut graph, &mut degrees, params)?;
    graph.finalize();

    debug!(candidates = drawn, repaired, "edge assignment finished");
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        layers = graph.layer_count(),
        seed = params.seed,
        "causal site generated"
    );
    Ok(graph)
}

/// Draw the node count of every layer.
fn draw_layer_sizes(params: &GeneratorParams, rng: &mut StdRng) -> Result<Vec<usize>, SiteError> {
    let layers = usize::try_from(params.layers).map_err(|_err| SiteError::TooManyNodes)?;
    let mut sizes = Vec::with_capacity(layers);
    match params.node_count {
        NodeCountMode::Fixed => {
            let count = float_to_count(params.avg_nodes_per_layer.round())?;
            if count == 0 {
                warn!(
                    avg = params.avg_nodes_per_layer,
                    "fixed node count rounds to 0; every layer is empty"
                );
            }
            sizes.resize(layers, count);
        }
        NodeCountMode::Poisson => {
            let poisson = Poisson::new(params.avg_nodes_per_layer).map_err(|err| {
                SiteError::InvalidParameters {
                    parameter: "avg_nodes_per_layer",
                    reason: err.to_string(),
                }
            })?;
            for layer in 0..layers {
                let count = float_to_count(poisson.sample(rng))?;
                if count == 0 {
                    warn!(layer, "poisson drew an empty layer; raised to 1 node");
                }
                sizes.push(count.max(1));
            }
        }
    }
    Ok(sizes)
}

/// Convert a non-negative whole `f64` draw into a node count.
fn float_to_count(value: f64) -> Result<usize, SiteError> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(SiteError::TooManyNodes);
    }
    // Range checked above; the value is a whole number.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = value as u32;
    usize::try_from(count).map_err(|_err| SiteError::TooManyNodes)
}

/// Tracks in/out degrees during generation and answers cap queries.
struct DegreeCounter {
    in_degree: Vec<u32>,
    out_degree: Vec<u32>,
    cap: DegreeCap,
    max_degree: u32,
}

impl DegreeCounter {
    fn new(nodes: usize, params: &GeneratorParams) -> Self {
        Self {
            in_degree: vec![0; nodes],
            out_degree: vec![0; nodes],
            cap: params.degree_cap,
            max_degree: params.max_degree,
        }
    }

    /// Whether adding `from -> to` keeps the capped endpoint within bounds.
    fn has_headroom(&self, from: NodeId, to: NodeId) -> bool {
        let current = match self.cap {
            DegreeCap::Predecessors => self.in_degree.get(to.index()),
            DegreeCap::Successors => self.out_degree.get(from.index()),
        };
        current.is_some_and(|&d| d < self.max_degree)
    }

    fn record(&mut self, from: NodeId, to: NodeId) {
        if let Some(d) = self.out_degree.get_mut(from.index()) {
            *d = d.saturating_add(1);
        }
        if let Some(d) = self.in_degree.get_mut(to.index()) {
            *d = d.saturating_add(1);
        }
    }

    fn forget(&mut self, from: NodeId, to: NodeId) {
        if let Some(d) = self.out_degree.get_mut(from.index()) {
            *d = d.saturating_sub(1);
        }
        if let Some(d) = self.in_degree.get_mut(to.index()) {
            *d = d.saturating_sub(1);
        }
    }

    fn in_degree(&self, node: NodeId) -> u32 {
        self.in_degree.get(node.index()).copied().unwrap_or(0)
    }
}

/// Candidate predecessors of a node in `layer`, closest layer first, with
/// their layer distance.
fn candidates(
    graph: &CausalGraph,
    layer: u32,
    lookback: u32,
) -> impl Iterator<Item = (NodeId, u32)> + '_ {
    (1..=lookback)
        .filter_map(move |distance| layer.checked_sub(distance).map(|l| (l, distance)))
        .flat_map(move |(l, distance)| graph.layer(l).iter().map(move |&u| (u, distance)))
}

/// Random edge assignment. Returns the number of candidates drawn.
fn assign_random_edges(
    graph: &mut CausalGraph,
    degrees: &mut DegreeCounter,
    params: &GeneratorParams,
    rng: &mut StdRng,
) -> u64 {
    let mut drawn: u64 = 0;
    for layer in 1..params.layers {
        let targets: Vec<NodeId> = graph.layer(layer).to_vec();
        for v in targets {
            let pool: Vec<(NodeId, u32)> =
                candidates(graph, layer, params.max_lookback_layers).collect();
            for (u, distance) in pool {
                let roll: f64 = rng.random();
                drawn = drawn.saturating_add(1);
                let threshold = if params.edge_distance_decay {
                    params.edge_probability / f64::from(distance)
                } else {
                    params.edge_probability
                };
                if roll < threshold && degrees.has_headroom(u, v) {
                    graph.insert_edge(u, v);
                    degrees.record(u, v);
                }
            }
        }
    }
    drawn
}

/// Connect every node above layer 0 that has no predecessor. Returns the
/// number of repaired nodes.
fn repair_isolated(
    graph: &mut CausalGraph,
    degrees: &mut DegreeCounter,
    params: &GeneratorParams,
) -> Result<u64, SiteError> {
    let mut repaired: u64 = 0;
    for layer in 1..params.layers {
        let targets: Vec<NodeId> = graph.layer(layer).to_vec();
        for v in targets {
            if degrees.in_degree(v) > 0 {
                continue;
            }
            let parent = candidates(graph, layer, params.max_lookback_layers)
                .map(|(u, _)| u)
                .find(|&u| degrees.has_headroom(u, v));
            if let Some(u) = parent {
                graph.insert_edge(u, v);
                degrees.record(u, v);
                debug!(node = %v, parent = %u, layer, "repaired isolated node");
            } else if let Some((u, released)) = rewire_source(graph, degrees, params, layer) {
                graph.remove_edge(u, released);
                degrees.forget(u, released);
                graph.insert_edge(u, v);
                degrees.record(u, v);
                debug!(
                    node = %v,
                    parent = %u,
                    released = %released,
                    layer,
                    "repaired isolated node by moving an edge"
                );
            } else {
                return Err(SiteError::RepairImpossible { node: v, layer });
            }
            repaired = repaired.saturating_add(1);
        }
    }
    Ok(repaired)
}

/// Under a successor cap, find a full candidate `u` of a node in `layer`
/// with a successor that has another predecessor. Moving `u`'s edge away
/// from that successor leaves both it and `u`'s out-degree within bounds.
///
/// Candidates are visited closest layer first, ascending ID; the released
/// successor is the smallest eligible ID.
fn rewire_source(
    graph: &CausalGraph,
    degrees: &DegreeCounter,
    params: &GeneratorParams,
    layer: u32,
) -> Option<(NodeId, NodeId)> {
    if params.degree_cap != DegreeCap::Successors {
        return None;
    }
    candidates(graph, layer, params.max_lookback_layers).find_map(|(u, _)| {
        graph
            .successors(u)
            .iter()
            .copied()
            .filter(|&w| degrees.in_degree(w) >= 2)
            .min()
            .map(|w| (u, w))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Shared buffer the test subscriber writes formatted events into.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a warn-level subscriber and return its output.
    fn with_captured_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        (out, text)
    }

    fn small_params() -> GeneratorParams {
        GeneratorParams {
            layers: 12,
            avg_nodes_per_layer: 8.0,
            node_count: NodeCountMode::Poisson,
            edge_probability: 0.3,
            edge_distance_decay: false,
            max_lookback_layers: 3,
            max_degree: 3,
            degree_cap: DegreeCap::Predecessors,
            seed: 7,
        }
    }

    #[test]
    fn same_seed_same_graph() {
        let a = generate(&small_params()).unwrap();
        let b = generate(&small_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_changes_graph() {
        let a = generate(&small_params()).unwrap();
        let b = generate(&GeneratorParams {
            seed: 8,
            ..small_params()
        })
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn edges_climb_within_lookback() {
        let params = small_params();
        let graph = generate(&params).unwrap();
        for (from, to) in graph.edges() {
            let (a, b) = (graph.layer_of(from).unwrap(), graph.layer_of(to).unwrap());
            assert!(b > a, "edge {from}->{to} does not climb");
            assert!(b.abs_diff(a) <= params.max_lookback_layers);
        }
    }

    #[test]
    fn predecessor_cap_is_respected() {
        let params = small_params();
        let graph = generate(&params).unwrap();
        for node in graph.node_ids() {
            assert!(graph.in_degree(node) <= 3);
        }
    }

    #[test]
    fn successor_cap_is_respected() {
        let params = GeneratorParams {
            degree_cap: DegreeCap::Successors,
            max_degree: 2,
            edge_probability: 0.9,
            ..small_params()
        };
        let graph = generate(&params).unwrap();
        for node in graph.node_ids() {
            assert!(graph.out_degree(node) <= 2);
            if graph.layer_of(node).unwrap() > 0 {
                assert!(graph.in_degree(node) >= 1, "node {node} is isolated");
            }
        }
    }

    #[test]
    fn repair_moves_an_edge_under_a_successor_cap() {
        // Both sources already feed node 2; node 3 is isolated and every
        // source is at its cap of one successor.
        let params = GeneratorParams {
            layers: 2,
            max_lookback_layers: 1,
            max_degree: 1,
            degree_cap: DegreeCap::Successors,
            ..small_params()
        };
        let mut graph = CausalGraph::with_layer_sizes(&[2, 2]).unwrap();
        let mut degrees = DegreeCounter::new(graph.node_count(), &params);
        for from in [NodeId(0), NodeId(1)] {
            graph.insert_edge(from, NodeId(2));
            degrees.record(from, NodeId(2));
        }

        let repaired = repair_isolated(&mut graph, &mut degrees, &params).unwrap();
        graph.finalize();
        assert_eq!(repaired, 1);
        assert_eq!(graph.predecessors(NodeId(2)), &[NodeId(1)]);
        assert_eq!(graph.predecessors(NodeId(3)), &[NodeId(0)]);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.node_ids().all(|n| graph.out_degree(n) <= 1));
    }

    #[test]
    fn predecessor_cap_never_moves_edges() {
        let params = GeneratorParams {
            layers: 2,
            max_lookback_layers: 1,
            max_degree: 0,
            ..small_params()
        };
        let mut graph = CausalGraph::with_layer_sizes(&[1, 1]).unwrap();
        let degrees = DegreeCounter::new(graph.node_count(), &params);
        graph.insert_edge(NodeId(0), NodeId(1));
        assert_eq!(rewire_source(&graph, &degrees, &params, 1), None);
    }

    #[test]
    fn poisson_empty_draws_are_raised_to_one_node() {
        let params = GeneratorParams {
            layers: 10,
            avg_nodes_per_layer: 0.01,
            max_lookback_layers: 1,
            max_degree: 2,
            ..small_params()
        };
        let (graph, logs) = with_captured_warnings(|| generate(&params));
        let graph = graph.unwrap();
        assert_eq!(graph.layer_count(), 10);
        assert!(graph.layers().all(|layer| !layer.is_empty()));
        assert!(logs.contains("poisson drew an empty layer"), "{logs}");
        for node in graph.node_ids() {
            if graph.layer_of(node).unwrap() > 0 {
                assert!(graph.in_degree(node) >= 1, "node {node} is isolated");
            }
        }
    }

    #[test]
    fn sparse_poisson_layers_generate_with_one_layer_lookback() {
        for seed in 0..20 {
            let params = GeneratorParams {
                layers: 30,
                avg_nodes_per_layer: 1.5,
                max_lookback_layers: 1,
                max_degree: 2,
                seed,
                ..small_params()
            };
            let graph = generate(&params).unwrap();
            assert!(graph.layers().all(|layer| !layer.is_empty()), "seed {seed}");
        }
    }

    #[test]
    fn every_node_above_layer_zero_has_a_predecessor() {
        let params = GeneratorParams {
            edge_probability: 0.0,
            ..small_params()
        };
        let graph = generate(&params).unwrap();
        for node in graph.node_ids() {
            if graph.layer_of(node).unwrap() > 0 {
                assert!(graph.in_degree(node) >= 1, "node {node} is isolated");
            }
        }
    }

    #[test]
    fn repair_uses_closest_layer_first() {
        let params = GeneratorParams {
            layers: 3,
            avg_nodes_per_layer: 2.0,
            node_count: NodeCountMode::Fixed,
            edge_probability: 0.0,
            max_lookback_layers: 2,
            ..small_params()
        };
        let graph = generate(&params).unwrap();
        // Layer 2 nodes (IDs 4, 5) are repaired from layer 1 (IDs 2, 3).
        assert_eq!(graph.predecessors(NodeId(4)), &[NodeId(2)]);
        assert_eq!(graph.predecessors(NodeId(5)), &[NodeId(2)]);
    }

    #[test]
    fn zero_cap_makes_repair_impossible() {
        let params = GeneratorParams {
            max_degree: 0,
            ..small_params()
        };
        let result = generate(&params);
        assert!(matches!(result, Err(SiteError::RepairImpossible { .. })));
    }

    #[test]
    fn successor_cap_exhaustion_makes_repair_impossible() {
        // One source with a successor cap of 1 cannot feed two children.
        let params = GeneratorParams {
            layers: 2,
            avg_nodes_per_layer: 1.0,
            node_count: NodeCountMode::Fixed,
            edge_probability: 0.0,
            max_degree: 1,
            degree_cap: DegreeCap::Successors,
            ..small_params()
        };
        assert!(generate(&params).is_ok());

        let mut graph = CausalGraph::with_layer_sizes(&[1, 2]).unwrap();
        let mut degrees = DegreeCounter::new(graph.node_count(), &params);
        let result = repair_isolated(&mut graph, &mut degrees, &params);
        assert!(matches!(
            result,
            Err(SiteError::RepairImpossible { node: NodeId(2), layer: 1 })
        ));
    }

    #[test]
    fn fixed_mode_uses_exact_counts() {
        let params = GeneratorParams {
            node_count: NodeCountMode::Fixed,
            avg_nodes_per_layer: 5.0,
            ..small_params()
        };
        let graph = generate(&params).unwrap();
        assert!(graph.layers().all(|layer| layer.len() == 5));
        assert_eq!(graph.node_count(), 60);
    }

    #[test]
    fn distance_decay_never_adds_edges() {
        let base = GeneratorParams {
            node_count: NodeCountMode::Fixed,
            max_degree: 1000,
            ..small_params()
        };
        let plain = generate(&base).unwrap();
        let decayed = generate(&GeneratorParams {
            edge_distance_decay: true,
            ..base
        })
        .unwrap();
        // Same draws against lower thresholds, so each node's random
        // predecessor set can only shrink; repair adds at most one back.
        assert!(decayed.edge_count() <= plain.edge_count());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let bad = [
            GeneratorParams {
                layers: 0,
                ..small_params()
            },
            GeneratorParams {
                edge_probability: 1.5,
                ..small_params()
            },
            GeneratorParams {
                max_lookback_layers: 0,
                ..small_params()
            },
            GeneratorParams {
                avg_nodes_per_layer: 0.0,
                ..small_params()
            },
        ];
        for params in bad {
            assert!(matches!(
                generate(&params),
                Err(SiteError::InvalidParameters { .. })
            ));
        }
    }
}
