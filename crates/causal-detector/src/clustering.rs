//! Grouping of looping cells into candidate particles.
//!
//! Looping cells are split by period; within a period, connected
//! components are found by breadth-first search over the static cell
//! adjacency restricted to cells looping with that same period. Periods
//! ascend, and each search starts from the lowest unvisited cell ID, so the
//! output order is fully determined by the input.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use causal_site::CellGrid;
use causal_types::CellId;

/// A connected set of cells sharing one loop period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// The shared period.
    pub period: u64,
    /// Member cells, ascending.
    pub cells: BTreeSet<CellId>,
}

/// Find every cluster of at least `min_size` cells.
pub fn find_clusters(
    grid: &CellGrid,
    looping: &BTreeMap<CellId, u64>,
    min_size: usize,
) -> Vec<Cluster> {
    let mut by_period: BTreeMap<u64, BTreeSet<CellId>> = BTreeMap::new();
    for (&cell, &period) in looping {
        by_period.entry(period).or_default().insert(cell);
    }

    let mut clusters = Vec::new();
    for (period, members) in by_period {
        let mut visited: BTreeSet<CellId> = BTreeSet::new();
        for &start in &members {
            if visited.contains(&start) {
                continue;
            }
            let component = component_from(grid, &members, &mut visited, start);
            if component.len() >= min_size {
                clusters.push(Cluster {
                    period,
                    cells: component,
                });
            }
        }
    }
    clusters
}

fn component_from(
    grid: &CellGrid,
    members: &BTreeSet<CellId>,
    visited: &mut BTreeSet<CellId>,
    start: CellId,
) -> BTreeSet<CellId> {
    let mut component = BTreeSet::new();
    let mut queue = VecDeque::from([start]);
    visited.insert(start);
    while let Some(cell) = queue.pop_front() {
        component.insert(cell);
        for &next in grid.neighbors(cell) {
            if members.contains(&next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    component
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use causal_site::{CausalGraph, CellGridParams};
    use causal_types::{CellAdjacency, NodeId};

    /// Five single-node cells along the x axis: bins 0..5 of a 5-wide grid.
    fn row() -> (CellGrid, Vec<CellId>) {
        let graph = CausalGraph::with_layer_sizes(&[5]).unwrap();
        let positions: Vec<_> = (0..5).map(|i| [f64::from(i), 0.0, 0.0]).collect();
        let grid = CellGrid::build(
            &graph,
            &positions,
            &CellGridParams {
                grid_size: 5,
                adjacency: CellAdjacency::Spatial,
                hidden_layer: None,
            },
        )
        .unwrap();
        let ids = (0..5).map(|n| grid.cell_of(NodeId(n)).unwrap()).collect();
        (grid, ids)
    }

    #[test]
    fn adjacent_cells_with_equal_period_merge() {
        let (grid, ids) = row();
        let looping = BTreeMap::from([(ids[0], 3), (ids[1], 3), (ids[2], 3)]);
        let clusters = find_clusters(&grid, &looping, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cells.len(), 3);
        assert_eq!(clusters[0].period, 3);
    }

    #[test]
    fn different_periods_never_merge() {
        let (grid, ids) = row();
        let looping = BTreeMap::from([(ids[0], 3), (ids[1], 4), (ids[2], 3)]);
        let clusters = find_clusters(&grid, &looping, 1);
        assert_eq!(clusters.len(), 3);
        // Ascending period, then ascending cell.
        assert_eq!(clusters[0].cells, BTreeSet::from([ids[0]]));
        assert_eq!(clusters[1].cells, BTreeSet::from([ids[2]]));
        assert_eq!(clusters[2].period, 4);
    }

    #[test]
    fn gaps_split_components() {
        let (grid, ids) = row();
        let looping = BTreeMap::from([(ids[0], 2), (ids[1], 2), (ids[3], 2), (ids[4], 2)]);
        let clusters = find_clusters(&grid, &looping, 1);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn small_components_are_dropped() {
        let (grid, ids) = row();
        let looping = BTreeMap::from([(ids[0], 2), (ids[1], 2), (ids[3], 2)]);
        let clusters = find_clusters(&grid, &looping, 2);
        assert_eq!(clusters.len(), 1);
        assert!(clusters.iter().all(|c| c.cells.len() >= 2));
    }

    #[test]
    fn no_looping_cells_means_no_clusters() {
        let (grid, _) = row();
        assert!(find_clusters(&grid, &BTreeMap::new(), 1).is_empty());
    }
}
