//! The static substrate of the causal site simulation.
//!
//! Everything here is computed once before the first tick and then shared
//! read-only by the state manager and the particle detector: the layered
//! causal graph, node positions, and the detector's cell partition.
//!
//! # Modules
//!
//! - [`graph`] -- [`CausalGraph`], a layered DAG with sorted adjacency lists.
//! - [`generator`] -- Seeded random generation with degree caps and a
//!   repair pass for isolated nodes.
//! - [`layout`] -- Planar and ring node positions.
//! - [`cells`] -- [`CellGrid`], the bounding-box grid partition and cell
//!   adjacency used for hashing and clustering.
//! - [`export`] -- The static graph document consumed by visualizers.
//! - [`error`] -- Error types for generation and partitioning.

pub mod cells;
pub mod error;
pub mod export;
pub mod generator;
pub mod graph;
pub mod layout;

// Re-export primary types at crate root.
pub use cells::{Cell, CellGrid, CellGridParams};
pub use error::SiteError;
pub use export::static_graph;
pub use generator::{GeneratorParams, generate};
pub use graph::CausalGraph;
pub use layout::{LayoutParams, compute_positions};
