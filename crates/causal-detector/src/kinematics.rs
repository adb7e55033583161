//! Centroid and radius of a particle.

use causal_site::CellGrid;
use causal_types::{CellId, Kinematics};

/// Compute kinematics for a set of cells.
///
/// Each cell center is weighted by the number of nodes in the cell. The
/// radius is the weighted RMS distance of the centers from the centroid, so
/// a single-cell particle has radius 0. Unknown cells are ignored.
#[allow(clippy::cast_precision_loss)]
pub fn compute<'a>(grid: &CellGrid, cells: impl IntoIterator<Item = &'a CellId>) -> Kinematics {
    let weighted: Vec<([f64; 3], f64)> = cells
        .into_iter()
        .filter_map(|id| grid.cell(*id))
        .map(|cell| (cell.center, cell.members.len() as f64))
        .collect();

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Kinematics::default();
    }

    let mut centroid = [0.0; 3];
    for (center, weight) in &weighted {
        for (acc, v) in centroid.iter_mut().zip(center) {
            *acc += v * weight;
        }
    }
    centroid = centroid.map(|c| c / total);

    let spread: f64 = weighted
        .iter()
        .map(|(center, weight)| {
            let dist_sq: f64 = center
                .iter()
                .zip(&centroid)
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            dist_sq * weight
        })
        .sum();

    Kinematics {
        centroid,
        radius: (spread / total).sqrt(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use causal_site::{CausalGraph, CellGridParams};
    use causal_types::{CellAdjacency, NodeId};

    /// Three nodes in cell A at x=0, one node in cell B at x=4.
    fn grid() -> CellGrid {
        let graph = CausalGraph::with_layer_sizes(&[4]).unwrap();
        let positions = vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
        ];
        CellGrid::build(
            &graph,
            &positions,
            &CellGridParams {
                grid_size: 2,
                adjacency: CellAdjacency::Spatial,
                hidden_layer: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn single_cell_has_zero_radius() {
        let grid = grid();
        let a = grid.cell_of(NodeId(0)).unwrap();
        let k = compute(&grid, &[a]);
        assert_eq!(k.centroid, [0.0, 0.0, 0.0]);
        assert_eq!(k.radius, 0.0);
    }

    #[test]
    fn centroid_is_weighted_by_node_count() {
        let grid = grid();
        let a = grid.cell_of(NodeId(0)).unwrap();
        let b = grid.cell_of(NodeId(3)).unwrap();
        let k = compute(&grid, &[a, b]);
        assert_eq!(k.centroid, [1.0, 0.0, 0.0]);
        // sqrt((3 * 1 + 1 * 9) / 4) = sqrt(3)
        assert!((k.radius - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_set_is_at_the_origin() {
        let k = compute(&grid(), core::iter::empty());
        assert_eq!(k, Kinematics::default());
    }
}
