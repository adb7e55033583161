//! Error types for the `causal-detector` crate.

/// Errors raised by the particle detector.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// A detector parameter is out of range.
    #[error("invalid detector parameter {parameter}: {reason}")]
    InvalidParameters {
        /// The offending parameter name.
        parameter: &'static str,
        /// Explanation of what is wrong with it.
        reason: String,
    },

    /// The tag vector does not cover every partitioned node.
    #[error("tag vector has {actual} entries, the cell grid covers {expected} nodes")]
    TagCountMismatch {
        /// Nodes in the cell grid.
        expected: usize,
        /// Length of the supplied tag vector.
        actual: usize,
    },

    /// Ticks must be observed in strictly increasing order.
    #[error("tick {tick} observed after tick {last}")]
    NonMonotonicTick {
        /// The rejected tick.
        tick: u64,
        /// The most recently observed tick.
        last: u64,
    },
}
