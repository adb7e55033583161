//! The causal site: a layered, acyclic directed graph.
//!
//! Nodes are stored densely by [`NodeId`]; per-node predecessor and
//! successor lists are kept sorted by ID once construction finishes. The
//! sorted predecessor list is the ordered tuple the fusion rules consume.
//!
//! Every edge runs from a lower layer to a strictly higher layer, so the
//! graph is a DAG by construction.

use std::collections::BTreeSet;

use causal_types::NodeId;

use crate::error::SiteError;

/// Immutable causal graph shared by the state manager and the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CausalGraph {
    /// Node IDs per layer, ascending.
    layers: Vec<Vec<NodeId>>,
    /// Layer of each node, indexed by node ID.
    node_layers: Vec<u32>,
    /// Sorted predecessor lists, indexed by node ID.
    predecessors: Vec<Vec<NodeId>>,
    /// Sorted successor lists, indexed by node ID.
    successors: Vec<Vec<NodeId>>,
    /// Total number of edges.
    edge_count: usize,
}

impl CausalGraph {
    /// Create a graph with the given number of nodes per layer and no edges.
    ///
    /// Node IDs are assigned consecutively, layer by layer.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::TooManyNodes`] if the total does not fit `u32`,
    /// or [`SiteError::InvalidParameters`] if there are more layers than
    /// `u32` can index.
    pub fn with_layer_sizes(sizes: &[usize]) -> Result<Self, SiteError> {
        let total = sizes
            .iter()
            .try_fold(0_usize, |acc, &n| acc.checked_add(n))
            .ok_or(SiteError::TooManyNodes)?;
        if u32::try_from(total).is_err() {
            return Err(SiteError::TooManyNodes);
        }

        let mut layers = Vec::with_capacity(sizes.len());
        let mut node_layers = Vec::with_capacity(total);
        let mut next: u32 = 0;
        for (layer_index, &size) in sizes.iter().enumerate() {
            let layer = u32::try_from(layer_index).map_err(|_err| SiteError::InvalidParameters {
                parameter: "layers",
                reason: "layer count exceeds u32 range".to_owned(),
            })?;
            let mut ids = Vec::with_capacity(size);
            for _ in 0..size {
                ids.push(NodeId(next));
                node_layers.push(layer);
                next = next.checked_add(1).ok_or(SiteError::TooManyNodes)?;
            }
            layers.push(ids);
        }

        Ok(Self {
            layers,
            node_layers,
            predecessors: vec![Vec::new(); total],
            successors: vec![Vec::new(); total],
            edge_count: 0,
        })
    }

    /// Build a graph from explicit layer sizes and `(predecessor, successor)`
    /// pairs, validating the layering invariants.
    ///
    /// Intended for hand-built test fixtures and replaying exported graphs.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::InvalidEdge`] for unknown endpoints, edges that
    /// do not strictly increase the layer, or duplicate edges.
    pub fn from_parts(sizes: &[usize], edges: &[(u32, u32)]) -> Result<Self, SiteError> {
        let mut graph = Self::with_layer_sizes(sizes)?;
        let mut seen = BTreeSet::new();
        for &(from, to) in edges {
            let (from, to) = (NodeId(from), NodeId(to));
            let (Some(from_layer), Some(to_layer)) = (graph.layer_of(from), graph.layer_of(to))
            else {
                return Err(SiteError::InvalidEdge {
                    from,
                    to,
                    reason: "endpoint does not exist",
                });
            };
            if to_layer <= from_layer {
                return Err(SiteError::InvalidEdge {
                    from,
                    to,
                    reason: "successor layer must be greater than predecessor layer",
                });
            }
            if !seen.insert((from, to)) {
                return Err(SiteError::InvalidEdge {
                    from,
                    to,
                    reason: "duplicate edge",
                });
            }
            graph.insert_edge(from, to);
        }
        graph.finalize();
        Ok(graph)
    }

    /// Append an edge without validation. Callers guarantee the layering
    /// invariant and uniqueness, and call [`Self::finalize`] afterwards.
    pub(crate) fn insert_edge(&mut self, from: NodeId, to: NodeId) {
        let inserted = match (
            self.successors.get_mut(from.index()),
            self.predecessors.get_mut(to.index()),
        ) {
            (Some(succ), Some(pred)) => {
                succ.push(to);
                pred.push(from);
                true
            }
            _ => false,
        };
        if inserted {
            self.edge_count = self.edge_count.saturating_add(1);
        }
    }

    /// Drop the edge `from -> to` if present. Returns whether it existed.
    /// Like [`Self::insert_edge`], leaves the lists unsorted until
    /// [`Self::finalize`].
    pub(crate) fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let (Some(succ), Some(pred)) = (
            self.successors.get_mut(from.index()),
            self.predecessors.get_mut(to.index()),
        ) else {
            return false;
        };
        let (Some(s), Some(p)) = (
            succ.iter().position(|&n| n == to),
            pred.iter().position(|&n| n == from),
        ) else {
            return false;
        };
        succ.swap_remove(s);
        pred.swap_remove(p);
        self.edge_count = self.edge_count.saturating_sub(1);
        true
    }

    /// Sort adjacency lists by node ID.
    pub(crate) fn finalize(&mut self) {
        for list in &mut self.predecessors {
            list.sort_unstable();
        }
        for list in &mut self.successors {
            list.sort_unstable();
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_layers.len()
    }

    /// Number of edges.
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of layers, including empty ones.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Node IDs in the given layer (empty for out-of-range layers).
    pub fn layer(&self, layer: u32) -> &[NodeId] {
        usize::try_from(layer)
            .ok()
            .and_then(|l| self.layers.get(l))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterate over layers in ascending order.
    pub fn layers(&self) -> impl Iterator<Item = &[NodeId]> {
        self.layers.iter().map(Vec::as_slice)
    }

    /// Layer of a node, or `None` if the node does not exist.
    pub fn layer_of(&self, node: NodeId) -> Option<u32> {
        self.node_layers.get(node.index()).copied()
    }

    /// Iterate over every node ID in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.layers.iter().flatten().copied()
    }

    /// Sorted predecessors of a node.
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        self.predecessors
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sorted successors of a node.
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        self.successors
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of incoming edges.
    pub fn in_degree(&self, node: NodeId) -> usize {
        self.predecessors(node).len()
    }

    /// Number of outgoing edges.
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.successors(node).len()
    }

    /// Whether the edge `from -> to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.successors(from).binary_search(&to).is_ok()
    }

    /// Iterate over all edges as `(predecessor, successor)`, ordered by
    /// predecessor then successor.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.node_ids()
            .flat_map(move |from| self.successors(from).iter().map(move |&to| (from, to)))
    }

    /// The largest layer distance spanned by any edge (0 for an edgeless graph).
    pub fn max_layer_span(&self) -> u32 {
        self.edges()
            .filter_map(|(from, to)| {
                let (a, b) = (self.layer_of(from)?, self.layer_of(to)?);
                b.checked_sub(a)
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn diamond() -> CausalGraph {
        // layer 0: 0, 1   layer 1: 2   layer 2: 3
        CausalGraph::from_parts(&[2, 1, 1], &[(1, 2), (0, 2), (2, 3), (0, 3)]).unwrap()
    }

    #[test]
    fn ids_are_assigned_layer_by_layer() {
        let graph = diamond();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.layer(0), &[NodeId(0), NodeId(1)]);
        assert_eq!(graph.layer(2), &[NodeId(3)]);
        assert_eq!(graph.layer_of(NodeId(2)), Some(1));
        assert!(graph.layer(9).is_empty());
    }

    #[test]
    fn adjacency_lists_are_sorted() {
        let graph = diamond();
        assert_eq!(graph.predecessors(NodeId(2)), &[NodeId(0), NodeId(1)]);
        assert_eq!(graph.successors(NodeId(0)), &[NodeId(2), NodeId(3)]);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.has_edge(NodeId(0), NodeId(3)));
        assert!(!graph.has_edge(NodeId(3), NodeId(0)));
    }

    #[test]
    fn edges_iterate_in_order() {
        let edges: Vec<_> = diamond().edges().collect();
        assert_eq!(
            edges,
            vec![
                (NodeId(0), NodeId(2)),
                (NodeId(0), NodeId(3)),
                (NodeId(1), NodeId(2)),
                (NodeId(2), NodeId(3)),
            ]
        );
        assert_eq!(diamond().max_layer_span(), 2);
    }

    #[test]
    fn rejects_edges_that_do_not_climb_layers() {
        let same_layer = CausalGraph::from_parts(&[2], &[(0, 1)]);
        assert!(matches!(same_layer, Err(SiteError::InvalidEdge { .. })));

        let backwards = CausalGraph::from_parts(&[1, 1], &[(1, 0)]);
        assert!(matches!(backwards, Err(SiteError::InvalidEdge { .. })));
    }

    #[test]
    fn rejects_unknown_and_duplicate_edges() {
        let unknown = CausalGraph::from_parts(&[1, 1], &[(0, 5)]);
        assert!(matches!(unknown, Err(SiteError::InvalidEdge { .. })));

        let duplicate = CausalGraph::from_parts(&[1, 1], &[(0, 1), (0, 1)]);
        assert!(matches!(duplicate, Err(SiteError::InvalidEdge { .. })));
    }

    #[test]
    fn removing_an_edge_updates_both_lists() {
        let mut graph = diamond();
        assert!(graph.remove_edge(NodeId(0), NodeId(2)));
        assert!(!graph.remove_edge(NodeId(0), NodeId(2)));
        graph.finalize();
        assert_eq!(graph.predecessors(NodeId(2)), &[NodeId(1)]);
        assert_eq!(graph.successors(NodeId(0)), &[NodeId(3)]);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn empty_layers_are_kept() {
        let graph = CausalGraph::with_layer_sizes(&[1, 0, 2]).unwrap();
        assert_eq!(graph.layer_count(), 3);
        assert!(graph.layer(1).is_empty());
        assert_eq!(graph.layer(2), &[NodeId(1), NodeId(2)]);
    }
}
