//! Records exchanged with external consumers.
//!
//! The shapes here are load-bearing: visualizers parse the static graph
//! export and the per-tick log field by field, so renaming a field or
//! changing its nesting is a breaking change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{NodeId, ParticleId};

/// A point in layout space, `[x, y, z]`.
pub type Vec3 = [f64; 3];

// ---------------------------------------------------------------------------
// Static graph export
// ---------------------------------------------------------------------------

/// Per-node entry of the static graph export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StaticNode {
    /// Layout position `[x, y, z]`.
    pub position: Vec3,
    /// Generation layer (0 = causal source layer).
    pub layer: u32,
    /// Grid coordinates of the detector cell holding the node.
    pub cell: [u32; 3],
}

/// The immutable description of a generated causal site.
///
/// Written once before the first tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StaticGraph {
    /// Every node keyed by its ID.
    pub nodes: BTreeMap<NodeId, StaticNode>,
    /// Edges as `[predecessor, successor]` pairs.
    pub edges: Vec<[NodeId; 2]>,
    /// Number of generated layers (including empty ones).
    pub total_layers: u32,
    /// Cells per axis of the detector grid.
    pub grid_size: u32,
}

// ---------------------------------------------------------------------------
// Per-tick log
// ---------------------------------------------------------------------------

/// Position and extent of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Kinematics {
    /// Node-weighted mean of member-cell centers.
    pub centroid: Vec3,
    /// Weighted RMS distance of member-cell centers from the centroid.
    pub radius: f64,
}

/// One live particle as reported in the tick log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ParticleRecord {
    /// Stable particle identifier.
    pub id: ParticleId,
    /// Loop period shared by every member cell.
    pub period: u64,
    /// Consecutive ticks (inclusive) the particle has been tracked.
    pub lifetime: u64,
    /// Number of member cells.
    pub num_cells: usize,
    /// Centroid and radius.
    pub kinematics: Kinematics,
    /// World-line: the most recent centroids, oldest first, ending with
    /// this tick's.
    pub track: Vec<Vec3>,
}

/// Particles that appeared or disappeared relative to the previous tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickEvents {
    /// IDs first detected this tick.
    pub spawned: Vec<ParticleId>,
    /// IDs with no successor cluster this tick.
    pub decayed: Vec<ParticleId>,
}

impl TickEvents {
    /// Whether nothing spawned or decayed.
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.decayed.is_empty()
    }
}

/// One line of the newline-delimited tick log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickRecord {
    /// The tick this record describes.
    pub tick: u64,
    /// Spawn and decay events.
    pub events: TickEvents,
    /// Every live particle, ordered by ID.
    pub particles: Vec<ParticleRecord>,
    /// Memory density of every node, indexed by node ID. Present only on
    /// snapshot ticks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub memory_density: Option<Vec<u16>>,
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Final summary of a particle that has decayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArchivedParticle {
    /// The particle's identifier.
    pub id: ParticleId,
    /// Period at the last tick it was seen.
    pub period: u64,
    /// Tick of first detection.
    pub first_seen_tick: u64,
    /// Last tick it was detected.
    pub last_seen_tick: u64,
    /// Lifetime reached before decay.
    pub lifetime: u64,
    /// Largest cell count it ever had.
    pub peak_cells: usize,
    /// Most recent centroids, oldest first.
    pub track: Vec<Vec3>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_record() -> TickRecord {
        TickRecord {
            tick: 12,
            events: TickEvents {
                spawned: vec![ParticleId(3)],
                decayed: vec![ParticleId(1)],
            },
            particles: vec![ParticleRecord {
                id: ParticleId(3),
                period: 4,
                lifetime: 1,
                num_cells: 2,
                kinematics: Kinematics {
                    centroid: [1.0, 0.0, -6.0],
                    radius: 0.5,
                },
                track: vec![[0.0, 0.0, -6.0], [1.0, 0.0, -6.0]],
            }],
            memory_density: None,
        }
    }

    #[test]
    fn tick_record_has_the_log_shape() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["tick"], 12);
        assert_eq!(value["events"]["spawned"][0], "3");
        assert_eq!(value["events"]["decayed"][0], "1");
        let particle = &value["particles"][0];
        assert_eq!(particle["id"], "3");
        assert_eq!(particle["period"], 4);
        assert_eq!(particle["lifetime"], 1);
        assert_eq!(particle["num_cells"], 2);
        assert_eq!(particle["kinematics"]["centroid"][2], -6.0);
        assert_eq!(particle["kinematics"]["radius"], 0.5);
        assert_eq!(particle["track"].as_array().unwrap().len(), 2);
        assert_eq!(particle["track"][1][0], 1.0);
        assert!(value.get("memory_density").is_none());
    }

    #[test]
    fn memory_density_snapshot_is_written_when_present() {
        let record = TickRecord {
            memory_density: Some(vec![0, 3, 1]),
            ..sample_record()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["memory_density"], serde_json::json!([0, 3, 1]));
        let restored: TickRecord = serde_json::from_value(value).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn tick_record_is_a_single_line() {
        let line = serde_json::to_string(&sample_record()).unwrap();
        assert!(!line.contains('\n'));
        let restored: TickRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(restored, sample_record());
    }

    #[test]
    fn empty_events_report_empty() {
        assert!(TickEvents::default().is_empty());
        assert!(!sample_record().events.is_empty());
    }

    #[test]
    fn static_graph_keys_nodes_by_string_id() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodeId(0),
            StaticNode {
                position: [0.0, 0.0, 0.0],
                layer: 0,
                cell: [0, 0, 0],
            },
        );
        let graph = StaticGraph {
            nodes,
            edges: vec![[NodeId(0), NodeId(1)]],
            total_layers: 2,
            grid_size: 4,
        };
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["nodes"]["0"]["layer"], 0);
        assert_eq!(value["edges"][0][1], 1);
    }
}
