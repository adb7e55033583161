//! Particle detection for the causal site simulation.
//!
//! The detector watches the visible tags of each cell, notices when a
//! cell's content recurs, and groups recurring cells into particles that
//! keep a stable identity across ticks.
//!
//! # Modules
//!
//! - [`hashing`] -- SHA-256 of a cell's sorted visible tags.
//! - [`history`] -- Fixed-capacity per-cell hash ring buffer.
//! - [`clustering`] -- Same-period connected components over cell adjacency.
//! - [`tracking`] -- Identity continuity, world-lines, and the decay archive.
//! - [`kinematics`] -- Weighted centroid and RMS radius.
//! - [`detector`] -- [`ParticleDetector`], the per-tick pipeline.
//! - [`error`] -- Error types for the detector.

pub mod clustering;
pub mod detector;
pub mod error;
pub mod hashing;
pub mod history;
pub mod kinematics;
pub mod tracking;

// Re-export primary types at crate root.
pub use clustering::{Cluster, find_clusters};
pub use detector::{Detection, DetectorParams, ParticleDetector};
pub use error::DetectorError;
pub use hashing::CellHash;
pub use history::HashHistory;
pub use tracking::{ParticleTracker, TrackedParticle, TrackerParams};
