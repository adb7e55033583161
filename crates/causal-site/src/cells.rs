//! Partition of the laid-out site into a cubic grid of detector cells.
//!
//! Each axis is normalized over the bounding box of all positions and cut
//! into `grid_size` bins. Only occupied cells are materialized. The
//! partition, each cell's center, and the cell adjacency are computed once
//! and never change afterwards.

use std::collections::{BTreeMap, BTreeSet};

use causal_types::{CellAdjacency, CellId, NodeId, Vec3};
use tracing::debug;

use crate::error::SiteError;
use crate::graph::CausalGraph;

/// Parameters of the cell partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGridParams {
    /// Bins per axis.
    pub grid_size: u32,
    /// Which cells count as neighbours.
    pub adjacency: CellAdjacency,
    /// Layer whose nodes are excluded from the visible member lists.
    pub hidden_layer: Option<u32>,
}

impl Default for CellGridParams {
    fn default() -> Self {
        Self {
            grid_size: 12,
            adjacency: CellAdjacency::Spatial,
            hidden_layer: Some(0),
        }
    }
}

/// One occupied cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Linear cell ID, `x + G * (y + G * z)`.
    pub id: CellId,
    /// Grid coordinates.
    pub coords: [u32; 3],
    /// Every member node, ascending.
    pub members: Vec<NodeId>,
    /// Members outside the hidden layer, ascending.
    pub visible: Vec<NodeId>,
    /// Mean position of all members.
    pub center: Vec3,
    /// Adjacent occupied cells, ascending.
    pub neighbors: Vec<CellId>,
}

/// The static cell partition.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    grid_size: u32,
    cells: BTreeMap<CellId, Cell>,
    /// Cell of each node, indexed by node ID.
    node_cells: Vec<CellId>,
}

impl CellGrid {
    /// Partition `graph` using `positions` (indexed by node ID).
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::InvalidParameters`] for a zero or oversized
    /// `grid_size`, and [`SiteError::LengthMismatch`] when `positions` does
    /// not cover every node.
    pub fn build(
        graph: &CausalGraph,
        positions: &[Vec3],
        params: &CellGridParams,
    ) -> Result<Self, SiteError> {
        let grid = params.grid_size;
        if grid == 0 {
            return Err(SiteError::InvalidParameters {
                parameter: "grid_size",
                reason: "must be at least 1".to_owned(),
            });
        }
        if grid.checked_pow(3).is_none() {
            return Err(SiteError::InvalidParameters {
                parameter: "grid_size",
                reason: "grid_size^3 exceeds the cell ID range".to_owned(),
            });
        }
        if positions.len() != graph.node_count() {
            return Err(SiteError::LengthMismatch {
                expected: graph.node_count(),
                actual: positions.len(),
            });
        }

        let bounds = Bounds::of(positions);
        let mut cells: BTreeMap<CellId, Cell> = BTreeMap::new();
        let mut node_cells = Vec::with_capacity(positions.len());

        for (node, position) in graph.node_ids().zip(positions) {
            let coords = bounds.bin(position, grid);
            let id = linear_id(coords, grid);
            node_cells.push(id);
            let cell = cells.entry(id).or_insert_with(|| Cell {
                id,
                coords,
                members: Vec::new(),
                visible: Vec::new(),
                center: [0.0; 3],
                neighbors: Vec::new(),
            });
            cell.members.push(node);
            if graph.layer_of(node) != params.hidden_layer {
                cell.visible.push(node);
            }
        }

        for cell in cells.values_mut() {
            cell.center = mean_position(&cell.members, positions);
        }

        let neighbors = match params.adjacency {
            CellAdjacency::Spatial => spatial_neighbors(&cells, grid),
            CellAdjacency::Causal => causal_neighbors(graph, &node_cells),
        };
        for (id, set) in neighbors {
            if let Some(cell) = cells.get_mut(&id) {
                cell.neighbors = set.into_iter().collect();
            }
        }

        debug!(
            occupied = cells.len(),
            grid_size = grid,
            adjacency = ?params.adjacency,
            "cell grid built"
        );
        Ok(Self {
            grid_size: grid,
            cells,
            node_cells,
        })
    }

    /// Bins per axis.
    pub const fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Number of partitioned nodes.
    pub fn node_count(&self) -> usize {
        self.node_cells.len()
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells in ascending ID order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Look up an occupied cell.
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// The cell holding `node`.
    pub fn cell_of(&self, node: NodeId) -> Option<CellId> {
        self.node_cells.get(node.index()).copied()
    }

    /// Adjacent occupied cells of `id` (empty for unknown cells).
    pub fn neighbors(&self, id: CellId) -> &[CellId] {
        self.cells
            .get(&id)
            .map(|cell| cell.neighbors.as_slice())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Binning
// ---------------------------------------------------------------------------

struct Bounds {
    min: Vec3,
    extent: Vec3,
}

impl Bounds {
    fn of(positions: &[Vec3]) -> Self {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for p in positions {
            for ((lo, hi), v) in min.iter_mut().zip(max.iter_mut()).zip(p) {
                *lo = lo.min(*v);
                *hi = hi.max(*v);
            }
        }
        let mut extent = [0.0; 3];
        for ((e, lo), hi) in extent.iter_mut().zip(&min).zip(&max) {
            *e = hi - lo;
        }
        Self { min, extent }
    }

    fn bin(&self, position: &Vec3, grid: u32) -> [u32; 3] {
        let mut coords = [0; 3];
        for (((c, v), lo), extent) in coords
            .iter_mut()
            .zip(position)
            .zip(&self.min)
            .zip(&self.extent)
        {
            *c = axis_bin(*v, *lo, *extent, grid);
        }
        coords
    }
}

fn axis_bin(value: f64, min: f64, extent: f64, grid: u32) -> u32 {
    if !extent.is_finite() || extent <= 0.0 {
        return 0;
    }
    let scaled = ((value - min) / extent * f64::from(grid)).floor();
    let last = grid.saturating_sub(1);
    if scaled <= 0.0 {
        return 0;
    }
    // Clamped into 0..grid before the cast.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bin = scaled.min(f64::from(last)) as u32;
    bin
}

/// `x + G * (y + G * z)`; fits `u32` because `grid^3` was checked.
fn linear_id(coords: [u32; 3], grid: u32) -> CellId {
    let [x, y, z] = coords;
    let id = z
        .saturating_mul(grid)
        .saturating_add(y)
        .saturating_mul(grid)
        .saturating_add(x);
    CellId(id)
}

#[allow(clippy::cast_precision_loss)]
fn mean_position(members: &[NodeId], positions: &[Vec3]) -> Vec3 {
    let mut sum = [0.0; 3];
    let mut count = 0_usize;
    for p in members.iter().filter_map(|n| positions.get(n.index())) {
        for (s, v) in sum.iter_mut().zip(p) {
            *s += v;
        }
        count = count.saturating_add(1);
    }
    if count == 0 {
        return sum;
    }
    let n = count as f64;
    sum.map(|s| s / n)
}

// ---------------------------------------------------------------------------
// Adjacency
// ---------------------------------------------------------------------------

type NeighborSets = BTreeMap<CellId, BTreeSet<CellId>>;

/// Face neighbours: coordinates differ by one along exactly one axis.
fn spatial_neighbors(cells: &BTreeMap<CellId, Cell>, grid: u32) -> NeighborSets {
    let mut sets = NeighborSets::new();
    for cell in cells.values() {
        let entry = sets.entry(cell.id).or_default();
        for axis in 0..3 {
            for step in [-1_i64, 1] {
                let mut coords = cell.coords;
                let Some(c) = coords.get_mut(axis) else {
                    continue;
                };
                let moved = i64::from(*c).saturating_add(step);
                let Ok(moved) = u32::try_from(moved) else {
                    continue;
                };
                if moved >= grid {
                    continue;
                }
                *c = moved;
                let other = linear_id(coords, grid);
                if cells.contains_key(&other) {
                    entry.insert(other);
                }
            }
        }
    }
    sets
}

/// Cells joined by at least one causal edge, in either direction.
fn causal_neighbors(graph: &CausalGraph, node_cells: &[CellId]) -> NeighborSets {
    let mut sets = NeighborSets::new();
    for (from, to) in graph.edges() {
        let (Some(&a), Some(&b)) = (node_cells.get(from.index()), node_cells.get(to.index()))
        else {
            continue;
        };
        if a != b {
            sets.entry(a).or_default().insert(b);
            sets.entry(b).or_default().insert(a);
        }
    }
    sets
}
