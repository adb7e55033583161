//! Static description of a generated site for external visualizers.

use std::collections::BTreeMap;

use causal_types::{StaticGraph, StaticNode, Vec3};

use crate::cells::CellGrid;
use crate::graph::CausalGraph;

/// Assemble the static graph export.
///
/// Nodes missing from `positions` or `cells` are placed at the origin in
/// cell `[0, 0, 0]`; callers that built both from `graph` never hit this.
pub fn static_graph(graph: &CausalGraph, positions: &[Vec3], cells: &CellGrid) -> StaticGraph {
    let mut nodes = BTreeMap::new();
    for node in graph.node_ids() {
        let position = positions.get(node.index()).copied().unwrap_or_default();
        let cell = cells
            .cell_of(node)
            .and_then(|id| cells.cell(id))
            .map_or([0; 3], |cell| cell.coords);
        nodes.insert(
            node,
            StaticNode {
                position,
                layer: graph.layer_of(node).unwrap_or(0),
                cell,
            },
        );
    }

    StaticGraph {
        nodes,
        edges: graph.edges().map(|(from, to)| [from, to]).collect(),
        total_layers: u32::try_from(graph.layer_count()).unwrap_or(u32::MAX),
        grid_size: cells.grid_size(),
    }
}
