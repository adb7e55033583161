//! Shared type definitions for the causal site simulation.
//!
//! This crate is the single source of truth for identifiers, configuration
//! enums, and the records handed to external consumers. Types defined here
//! flow downstream to `TypeScript` via `ts-rs` for dashboard tooling.
//!
//! # Modules
//!
//! - [`ids`] -- Dense integer wrappers for node, cell, and particle IDs
//! - [`enums`] -- Configuration enums (fusion mode, degree cap, layout, adjacency,
//!   hidden drive)
//! - [`structs`] -- Static graph export, tick log records, archived particles

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{
    CellAdjacency, DegreeCap, FusionMode, HiddenDrive, Layout, NodeCountMode, ParseVariantError,
};
pub use ids::{CellId, NodeId, ParticleId};
pub use structs::{
    ArchivedParticle, Kinematics, ParticleRecord, StaticGraph, StaticNode, TickEvents,
    TickRecord, Vec3,
};

/// A node's state value, always in `0..q`.
pub type Tag = u32;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::NodeId::export_all();
        let _ = crate::ids::CellId::export_all();
        let _ = crate::ids::ParticleId::export_all();

        // Enums
        let _ = crate::enums::FusionMode::export_all();
        let _ = crate::enums::DegreeCap::export_all();
        let _ = crate::enums::NodeCountMode::export_all();
        let _ = crate::enums::Layout::export_all();
        let _ = crate::enums::CellAdjacency::export_all();
        let _ = crate::enums::HiddenDrive::export_all();

        // Structs
        let _ = crate::structs::StaticNode::export_all();
        let _ = crate::structs::StaticGraph::export_all();
        let _ = crate::structs::Kinematics::export_all();
        let _ = crate::structs::ParticleRecord::export_all();
        let _ = crate::structs::TickEvents::export_all();
        let _ = crate::structs::TickRecord::export_all();
        let _ = crate::structs::ArchivedParticle::export_all();
    }
}
