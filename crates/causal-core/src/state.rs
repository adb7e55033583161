//! The state manager: tag vector, update functor, and memory density.
//!
//! A tick computes the entire next tag vector from the frozen previous one
//! into a second buffer, then swaps the buffers. Every node therefore reads
//! predecessor tags from the same tick, regardless of evaluation order, and
//! nothing can observe a half-updated vector because the swap happens under
//! `&mut self`.

use causal_site::CausalGraph;
use causal_types::{FusionMode, HiddenDrive, NodeId, Tag};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::clock::{ClockError, TickClock};
use crate::fusion::FusionRule;
use crate::hidden::HiddenClocks;

/// Multiplier of the deterministic initial tag assignment.
const INITIAL_TAG_MULTIPLIER: u64 = 173;

/// Separates the noise stream from the generation stream of the same seed.
const NOISE_STREAM: u64 = 0x6E6F_6973_655F_7631;

/// Errors raised by the state manager.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The alphabet must have at least two symbols.
    #[error("alphabet size q must be at least 2, got {q}")]
    InvalidAlphabet {
        /// The rejected alphabet size.
        q: u32,
    },

    /// A tag vector or graph does not match the managed node count.
    #[error("expected {expected} nodes, got {actual}")]
    LengthMismatch {
        /// Managed node count.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A supplied tag lies outside the alphabet.
    #[error("tag {tag} of node {node} is outside the alphabet 0..{q}")]
    TagOutOfRange {
        /// The node carrying the tag.
        node: NodeId,
        /// The rejected tag.
        tag: Tag,
        /// Alphabet size.
        q: u32,
    },

    /// The tick counter overflowed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// State manager parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateParams {
    /// Alphabet size `q`.
    pub q: u32,
    /// Fusion rule.
    pub fusion_mode: FusionMode,
    /// Append a node's own prior tag to its fusion input.
    pub include_self: bool,
    /// Redraw source-layer tags every tick.
    pub hidden_noise: bool,
    /// How the hidden layer evolves.
    pub hidden_drive: HiddenDrive,
    /// The hidden layer, if any.
    pub hidden_layer: Option<u32>,
    /// Seed of the noise and clock streams.
    pub seed: u64,
    /// Ceiling of the memory density counter.
    pub memory_window: u16,
}

impl Default for StateParams {
    fn default() -> Self {
        Self {
            q: 16,
            fusion_mode: FusionMode::Injective,
            include_self: false,
            hidden_noise: false,
            hidden_drive: HiddenDrive::Fusion,
            hidden_layer: Some(0),
            seed: 42,
            memory_window: 1024,
        }
    }
}

/// Owns the tag vector and applies the update functor once per tick.
#[derive(Debug, Clone)]
pub struct StateManager {
    rule: FusionRule,
    include_self: bool,
    tags: Vec<Tag>,
    next: Vec<Tag>,
    memory: Vec<u16>,
    memory_window: u16,
    clock: TickClock,
    noise: Option<StdRng>,
    clocks: Option<HiddenClocks>,
    scratch: Vec<Tag>,
}

impl StateManager {
    /// Create a state manager for `graph` with the deterministic initial
    /// tags `(id * 173) mod q`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidAlphabet`] when `q < 2`.
    pub fn new(graph: &CausalGraph, params: &StateParams) -> Result<Self, StateError> {
        if params.q < 2 {
            return Err(StateError::InvalidAlphabet { q: params.q });
        }
        let q = u64::from(params.q);
        let tags: Vec<Tag> = graph
            .node_ids()
            .map(|node| {
                let tag = u64::from(node.into_inner()).saturating_mul(INITIAL_TAG_MULTIPLIER) % q;
                Tag::try_from(tag).unwrap_or(0)
            })
            .collect();
        let nodes = tags.len();
        let clocks = match (params.hidden_drive, params.hidden_layer) {
            (HiddenDrive::AffineClock, Some(layer)) => {
                Some(HiddenClocks::new(graph.layer(layer), params.q, params.seed))
            }
            _ => None,
        };
        Ok(Self {
            rule: FusionRule::new(params.fusion_mode, params.q),
            include_self: params.include_self,
            next: tags.clone(),
            tags,
            memory: vec![0; nodes],
            memory_window: params.memory_window,
            clock: TickClock::new(),
            noise: params
                .hidden_noise
                .then(|| StdRng::seed_from_u64(params.seed ^ NOISE_STREAM)),
            clocks,
            scratch: Vec::new(),
        })
    }

    /// Replace the tag vector (used to seed hand-built scenarios).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LengthMismatch`] or
    /// [`StateError::TagOutOfRange`] for an unusable vector.
    pub fn set_tags(&mut self, tags: Vec<Tag>) -> Result<(), StateError> {
        if tags.len() != self.tags.len() {
            return Err(StateError::LengthMismatch {
                expected: self.tags.len(),
                actual: tags.len(),
            });
        }
        let q = self.rule.q();
        if let Some((index, &tag)) = tags.iter().enumerate().find(|&(_, &t)| t >= q) {
            return Err(StateError::TagOutOfRange {
                node: NodeId(u32::try_from(index).unwrap_or(u32::MAX)),
                tag,
                q,
            });
        }
        self.tags = tags;
        Ok(())
    }

    /// Apply the update functor once. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LengthMismatch`] when `graph` is not the graph
    /// this manager was built for, and [`StateError::Clock`] on tick
    /// overflow.
    pub fn tick(&mut self, graph: &CausalGraph) -> Result<u64, StateError> {
        if graph.node_count() != self.tags.len() {
            return Err(StateError::LengthMismatch {
                expected: self.tags.len(),
                actual: graph.node_count(),
            });
        }
        let tick = self.clock.advance()?;

        self.next.clone_from(&self.tags);
        for node in graph.node_ids() {
            let predecessors = graph.predecessors(node);
            if predecessors.is_empty() {
                continue;
            }
            self.scratch.clear();
            self.scratch.extend(
                predecessors
                    .iter()
                    .filter_map(|p| self.tags.get(p.index()).copied()),
            );
            let own = self.tags.get(node.index()).copied();
            if self.include_self {
                self.scratch.extend(own);
            }
            if let (Some(tag), Some(slot)) = (
                self.rule.fuse(node, &self.scratch),
                self.next.get_mut(node.index()),
            ) {
                *slot = tag;
            }
        }

        if let Some(clocks) = self.clocks.as_mut() {
            clocks.advance(tick, &self.tags, &mut self.next);
        }

        if let Some(rng) = self.noise.as_mut() {
            let q = self.rule.q();
            for node in graph.layer(0) {
                if let Some(slot) = self.next.get_mut(node.index()) {
                    *slot = rng.random_range(0..q);
                }
            }
        }

        let mut changed = 0_usize;
        for ((mem, old), new) in self.memory.iter_mut().zip(&self.tags).zip(&self.next) {
            if old == new {
                *mem = mem.saturating_sub(1);
            } else {
                *mem = mem.saturating_add(1).min(self.memory_window);
                changed = changed.saturating_add(1);
            }
        }

        core::mem::swap(&mut self.tags, &mut self.next);
        debug!(tick, changed, "state advanced");
        Ok(tick)
    }

    /// Current tag vector, indexed by node ID.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tag of one node.
    pub fn tag(&self, node: NodeId) -> Option<Tag> {
        self.tags.get(node.index()).copied()
    }

    /// Leaky change counter per node, in `0..=memory_window`.
    pub fn memory_density(&self) -> &[u16] {
        &self.memory
    }

    /// Number of completed ticks.
    pub const fn tick_count(&self) -> u64 {
        self.clock.tick()
    }

    /// The active fusion rule.
    pub const fn rule(&self) -> FusionRule {
        self.rule
    }

    /// Hidden-layer clocks, when the hidden layer is clock-driven.
    pub const fn hidden_clocks(&self) -> Option<&HiddenClocks> {
        self.clocks.as_ref()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    /// layer 0: 0, 1   layer 1: 2 (preds 0, 1), 3 (pred 1)
    fn small_graph() -> CausalGraph {
        CausalGraph::from_parts(&[2, 2], &[(0, 2), (1, 2), (1, 3)]).unwrap()
    }

    fn params(q: u32, fusion_mode: FusionMode) -> StateParams {
        StateParams {
            q,
            fusion_mode,
            ..StateParams::default()
        }
    }

    #[test]
    fn initial_tags_follow_the_multiplier() {
        let graph = small_graph();
        let state = StateManager::new(&graph, &params(3, FusionMode::SumModQ)).unwrap();
        // 0, 173, 346, 519 mod 3
        assert_eq!(state.tags(), &[0, 2, 1, 0]);
        assert_eq!(state.tick_count(), 0);
    }

    #[test]
    fn first_tick_is_one_and_reads_previous_tags() {
        let graph = small_graph();
        let mut state = StateManager::new(&graph, &params(3, FusionMode::SumModQ)).unwrap();
        assert_eq!(state.tick(&graph).unwrap(), 1);
        // node 2 = 0 + 2, node 3 = 2; sources unchanged.
        assert_eq!(state.tags(), &[0, 2, 2, 2]);
        assert_eq!(state.tick(&graph).unwrap(), 2);
        assert_eq!(state.tags(), &[0, 2, 2, 2]);
    }

    #[test]
    fn update_is_synchronous_along_chains() {
        // 0 -> 1 -> 2: a sequential in-place update would push node 0's tag
        // through the whole chain in one tick.
        let graph = CausalGraph::from_parts(&[1, 1, 1], &[(0, 1), (1, 2)]).unwrap();
        let mut state = StateManager::new(&graph, &params(5, FusionMode::SumModQ)).unwrap();
        state.set_tags(vec![4, 0, 0]).unwrap();
        state.tick(&graph).unwrap();
        assert_eq!(state.tags(), &[4, 4, 0]);
        state.tick(&graph).unwrap();
        assert_eq!(state.tags(), &[4, 4, 4]);
    }

    #[test]
    fn include_self_adds_the_prior_tag() {
        let graph = CausalGraph::from_parts(&[1, 1], &[(0, 1)]).unwrap();
        let mut state = StateManager::new(
            &graph,
            &StateParams {
                include_self: true,
                ..params(10, FusionMode::SumModQ)
            },
        )
        .unwrap();
        state.set_tags(vec![3, 1]).unwrap();
        state.tick(&graph).unwrap();
        assert_eq!(state.tags(), &[3, 4]);
        state.tick(&graph).unwrap();
        assert_eq!(state.tags(), &[3, 7]);
    }

    #[test]
    fn sources_are_static_without_noise() {
        let graph = small_graph();
        let mut state = StateManager::new(&graph, &params(7, FusionMode::Injective)).unwrap();
        let before = [state.tag(NodeId(0)), state.tag(NodeId(1))];
        for _ in 0..10 {
            state.tick(&graph).unwrap();
        }
        assert_eq!([state.tag(NodeId(0)), state.tag(NodeId(1))], before);
    }

    #[test]
    fn noise_is_deterministic_and_in_range() {
        let graph = small_graph();
        let noisy = StateParams {
            hidden_noise: true,
            seed: 9,
            ..params(50, FusionMode::Quadratic)
        };
        let mut a = StateManager::new(&graph, &noisy).unwrap();
        let mut b = StateManager::new(&graph, &noisy).unwrap();
        let mut sources_changed = false;
        let initial = a.tags().to_vec();
        for _ in 0..20 {
            a.tick(&graph).unwrap();
            b.tick(&graph).unwrap();
            assert_eq!(a.tags(), b.tags());
            assert!(a.tags().iter().all(|&t| t < 50));
            sources_changed |= a.tags()[..2] != initial[..2];
        }
        assert!(sources_changed);
    }

    #[test]
    fn affine_clock_drives_the_hidden_layer() {
        // layer 0: 0, 1   layer 1: 2 (preds 0, 1)   layer 2: 3 (pred 2)
        let graph = CausalGraph::from_parts(&[2, 1, 1], &[(0, 2), (1, 2), (2, 3)]).unwrap();
        let clocked = StateParams {
            hidden_drive: HiddenDrive::AffineClock,
            hidden_layer: Some(1),
            seed: 4,
            ..params(7, FusionMode::SumModQ)
        };
        let mut state = StateManager::new(&graph, &clocked).unwrap();
        let clock = state.hidden_clocks().unwrap().clocks()[0];
        assert_eq!(clock.node, NodeId(2));

        let before = state.tags().to_vec();
        state.tick(&graph).unwrap();
        let expected = (clock.multiplier * u64::from(before[2]) + clock.offset) % 7;
        assert_eq!(u64::from(state.tags()[2]), expected);
        // Node 3 still fuses from node 2's previous tag.
        assert_eq!(state.tags()[3], before[2]);
        // Sources are untouched.
        assert_eq!(state.tags()[..2], before[..2]);
    }

    #[test]
    fn affine_clock_keeps_a_source_layer_moving() {
        let graph = small_graph();
        let clocked = StateParams {
            hidden_drive: HiddenDrive::AffineClock,
            seed: 11,
            ..params(16, FusionMode::Injective)
        };
        let mut a = StateManager::new(&graph, &clocked).unwrap();
        let mut b = StateManager::new(&graph, &clocked).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..40 {
            a.tick(&graph).unwrap();
            b.tick(&graph).unwrap();
            assert_eq!(a.tags(), b.tags());
            assert!(a.tags().iter().all(|&t| t < 16));
            seen.insert(a.tags()[..2].to_vec());
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn fusion_drive_and_no_hidden_layer_build_no_clocks() {
        let graph = small_graph();
        let state = StateManager::new(&graph, &params(5, FusionMode::SumModQ)).unwrap();
        assert!(state.hidden_clocks().is_none());
        let unhidden = StateParams {
            hidden_drive: HiddenDrive::AffineClock,
            hidden_layer: None,
            ..params(5, FusionMode::SumModQ)
        };
        let state = StateManager::new(&graph, &unhidden).unwrap();
        assert!(state.hidden_clocks().is_none());
    }

    #[test]
    fn memory_density_is_a_bounded_leaky_counter() {
        let graph = CausalGraph::from_parts(&[1, 1], &[(0, 1)]).unwrap();
        let mut state = StateManager::new(
            &graph,
            &StateParams {
                include_self: true,
                memory_window: 3,
                ..params(1000, FusionMode::SumModQ)
            },
        )
        .unwrap();
        state.set_tags(vec![1, 0]).unwrap();
        // Node 1 increments by 1 every tick, so it changes every tick.
        for _ in 0..10 {
            state.tick(&graph).unwrap();
        }
        assert_eq!(state.memory_density(), &[0, 3]);

        state.set_tags(vec![0, 5]).unwrap();
        state.tick(&graph).unwrap();
        assert_eq!(state.memory_density(), &[0, 2]);
    }

    #[test]
    fn rejects_small_alphabets_and_bad_vectors() {
        let graph = small_graph();
        assert!(matches!(
            StateManager::new(&graph, &params(1, FusionMode::SumModQ)),
            Err(StateError::InvalidAlphabet { q: 1 })
        ));
        let mut state = StateManager::new(&graph, &params(3, FusionMode::SumModQ)).unwrap();
        assert!(matches!(
            state.set_tags(vec![0; 3]),
            Err(StateError::LengthMismatch { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            state.set_tags(vec![0, 0, 3, 0]),
            Err(StateError::TagOutOfRange { tag: 3, .. })
        ));
        let other = CausalGraph::with_layer_sizes(&[1]).unwrap();
        assert!(matches!(
            state.tick(&other),
            Err(StateError::LengthMismatch { .. })
        ));
    }
}
