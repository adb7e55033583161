//! Type-safe identifier wrappers.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. Unlike wall-clock
//! generated identifiers, these are dense integers assigned in a fixed
//! order, so two runs with the same seed produce the same IDs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

/// Generates a newtype wrapper around an unsigned integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier for a node of the causal site.
    ///
    /// Node IDs are dense and assigned in generation order, so they
    /// increase with layer index.
    NodeId(u32)
}

define_id! {
    /// Identifier for a detector cell (linear index into the grid).
    CellId(u32)
}

impl NodeId {
    /// Return the ID as a `usize` index into per-node vectors.
    pub fn index(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl CellId {
    /// Return the ID as a `usize` index into per-cell vectors.
    pub fn index(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

/// Identifier for a detected particle.
///
/// Particle IDs are assigned from a monotonic counter and never reused:
/// a particle that decays and later reappears gets a fresh ID. On the
/// wire the ID is a decimal string, which is the shape the tick log
/// consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ParticleId(#[ts(as = "String")] pub u64);

impl ParticleId {
    /// Return the inner counter value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Return the ID that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl core::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ParticleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ParticleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>()
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn node_id_serializes_as_number() {
        let json = serde_json::to_string(&NodeId(17)).unwrap();
        assert_eq!(json, "17");
    }

    #[test]
    fn particle_id_serializes_as_string() {
        let json = serde_json::to_string(&ParticleId(42)).unwrap();
        assert_eq!(json, "\"42\"");
        let restored: ParticleId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ParticleId(42));
    }

    #[test]
    fn particle_id_rejects_non_numeric_string() {
        let restored: Result<ParticleId, _> = serde_json::from_str("\"p-1\"");
        assert!(restored.is_err());
    }

    #[test]
    fn particle_id_next_is_monotonic() {
        let id = ParticleId(0);
        assert_eq!(id.next(), ParticleId(1));
        assert_eq!(ParticleId(u64::MAX).next(), ParticleId(u64::MAX));
    }

    #[test]
    fn node_id_keys_serialize_in_maps() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(NodeId(3), 1_u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, "{\"3\":1}");
    }
}
