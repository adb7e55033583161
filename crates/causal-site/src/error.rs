//! Error types for the `causal-site` crate.
//!
//! All fallible operations in this crate return [`SiteError`]. Every
//! variant is a configuration or construction defect: generation is a pure
//! function of its parameters, so nothing here is retryable.

use causal_types::NodeId;

/// Errors that can occur while generating or partitioning a causal site.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// A generation or grid parameter is out of range.
    #[error("invalid parameter {parameter}: {reason}")]
    InvalidParameters {
        /// The offending parameter name.
        parameter: &'static str,
        /// Explanation of what is wrong with it.
        reason: String,
    },

    /// A node with no predecessors could not be connected without
    /// breaking the degree cap or the lookback window.
    #[error("cannot repair isolated node {node} in layer {layer}: no eligible predecessor")]
    RepairImpossible {
        /// The isolated node.
        node: NodeId,
        /// Its layer.
        layer: u32,
    },

    /// An explicitly supplied edge violates the layering invariants.
    #[error("invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        /// Predecessor endpoint.
        from: NodeId,
        /// Successor endpoint.
        to: NodeId,
        /// Which invariant the edge breaks.
        reason: &'static str,
    },

    /// The node count does not fit the identifier space.
    #[error("node count exceeds the u32 identifier range")]
    TooManyNodes,

    /// A per-node input slice does not match the graph size.
    #[error("expected {expected} entries, got {actual}")]
    LengthMismatch {
        /// Number of nodes in the graph.
        expected: usize,
        /// Length of the supplied slice.
        actual: usize,
    },
}
