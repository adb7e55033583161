//! Enumeration types shared between configuration and the simulation crates.
//!
//! Every enum here appears in `causal-config.yaml`, so each one serializes
//! as a `snake_case` string.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a configuration string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseVariantError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Fusion rules
// ---------------------------------------------------------------------------

/// Which fusion rule combines predecessor tags into a node's next tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FusionMode {
    /// Sum of predecessor tags modulo `q`.
    SumModQ,
    /// Squared sum plus pairwise products, modulo `q`.
    Quadratic,
    /// Order-sensitive rule with the minimum number of collisions.
    #[default]
    Injective,
}

impl FusionMode {
    /// All variants in declaration order.
    pub const ALL: [Self; 3] = [Self::SumModQ, Self::Quadratic, Self::Injective];

    /// The configuration name of this mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SumModQ => "sum_mod_q",
            Self::Quadratic => "quadratic",
            Self::Injective => "injective",
        }
    }
}

impl core::fmt::Display for FusionMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionMode {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ParseVariantError {
                kind: "fusion mode",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Graph generation
// ---------------------------------------------------------------------------

/// Which endpoint's edge count is bounded by `max_out_degree_R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DegreeCap {
    /// Each node has at most `R` incoming edges (bounded fusion arity).
    #[default]
    Predecessors,
    /// Each node has at most `R` outgoing edges.
    Successors,
}

/// How many nodes each layer receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeCountMode {
    /// Poisson-distributed around `avg_nodes_per_layer`.
    #[default]
    Poisson,
    /// Exactly `avg_nodes_per_layer` (rounded) in every layer.
    Fixed,
}

/// Spatial arrangement of nodes used for cells and kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Layout {
    /// Nodes of a layer on a line; every node has `y = 0`.
    #[default]
    Planar,
    /// Nodes of a layer on a circle around the z axis.
    Ring,
}

/// How the nodes of the hidden layer evolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HiddenDrive {
    /// Like every other node: fused from predecessors, static without any.
    #[default]
    Fusion,
    /// Each hidden node runs its own affine clock `t -> (a * t + b) mod q`
    /// whose coefficients drift every few ticks.
    AffineClock,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Which cells count as neighbours when clustering looping cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CellAdjacency {
    /// Cells whose grid coordinates differ by one along exactly one axis.
    #[default]
    Spatial,
    /// Cells joined by at least one causal edge, in either direction.
    Causal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fusion_mode_round_trips_through_names() {
        for mode in FusionMode::ALL {
            assert_eq!(mode.as_str().parse::<FusionMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn unknown_fusion_mode_is_rejected() {
        let err = "xor".parse::<FusionMode>().unwrap_err();
        assert_eq!(err.value, "xor");
        assert!(err.to_string().contains("fusion mode"));
    }

    #[test]
    fn defaults_match_documented_choices() {
        assert_eq!(DegreeCap::default(), DegreeCap::Predecessors);
        assert_eq!(CellAdjacency::default(), CellAdjacency::Spatial);
        assert_eq!(Layout::default(), Layout::Planar);
        assert_eq!(NodeCountMode::default(), NodeCountMode::Poisson);
        assert_eq!(HiddenDrive::default(), HiddenDrive::Fusion);
    }

    #[test]
    fn hidden_drive_uses_snake_case_names() {
        let json = serde_json::to_string(&HiddenDrive::AffineClock).unwrap();
        assert_eq!(json, "\"affine_clock\"");
        let parsed: HiddenDrive = serde_json::from_str("\"fusion\"").unwrap();
        assert_eq!(parsed, HiddenDrive::Fusion);
    }
}
