//! Spatial layout of the causal site.
//!
//! Positions exist only for the detector's cell partition, kinematics, and
//! visualization. The fusion dynamics never see them.

use causal_types::{Layout, Vec3};

use crate::graph::CausalGraph;

/// Layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Arrangement within a layer.
    pub layout: Layout,
    /// Distance between neighbouring nodes of a layer.
    pub node_spacing: f64,
    /// Distance between consecutive layers along `-z`.
    pub layer_depth: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            layout: Layout::Planar,
            node_spacing: 5.0,
            layer_depth: 6.0,
        }
    }
}

/// Compute a position for every node, indexed by node ID.
pub fn compute_positions(graph: &CausalGraph, params: &LayoutParams) -> Vec<Vec3> {
    let mut positions = vec![[0.0; 3]; graph.node_count()];
    for (layer_index, nodes) in graph.layers().enumerate() {
        let z = -to_f64(layer_index) * params.layer_depth;
        let n = to_f64(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let i = to_f64(i);
            let (x, y) = match params.layout {
                Layout::Planar => ((i - n / 2.0) * params.node_spacing, 0.0),
                Layout::Ring => ring_point(i, n, params.node_spacing),
            };
            if let Some(slot) = positions.get_mut(node.index()) {
                *slot = [x, y, z];
            }
        }
    }
    positions
}

/// Point `i` of `n` evenly spaced on a circle of radius `spacing * sqrt(n)`.
fn ring_point(i: f64, n: f64, spacing: f64) -> (f64, f64) {
    if n <= 1.0 {
        return (0.0, 0.0);
    }
    let radius = spacing * n.sqrt();
    let theta = core::f64::consts::TAU * i / n;
    (radius * theta.cos(), radius * theta.sin())
}

/// Lossless for every count a graph can hold (IDs fit `u32`).
fn to_f64(value: usize) -> f64 {
    u32::try_from(value).map_or(f64::from(u32::MAX), f64::from)
}
