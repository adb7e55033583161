//! Content hashes of cell states.
//!
//! A cell's hash depends only on the multiset of its visible tags: the tags
//! are sorted before hashing, so permuting tags among a cell's members does
//! not change the hash.

use core::fmt;

use causal_types::{NodeId, Tag};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a cell's sorted visible tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellHash(pub [u8; 32]);

impl CellHash {
    /// Hash a multiset of tags. `tags` is sorted in place.
    pub fn of_tags(tags: &mut [Tag]) -> Self {
        tags.sort_unstable();
        let mut hasher = Sha256::new();
        for tag in tags.iter() {
            hasher.update(tag.to_le_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Hash the current tags of `members`, reusing `scratch` as a buffer.
    ///
    /// Members without a tag entry are skipped; the detector validates the
    /// tag vector length before hashing.
    pub fn of_members(members: &[NodeId], tags: &[Tag], scratch: &mut Vec<Tag>) -> Self {
        scratch.clear();
        scratch.extend(members.iter().filter_map(|n| tags.get(n.index()).copied()));
        Self::of_tags(scratch)
    }
}

impl fmt::Display for CellHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_member_order() {
        let tags = [4, 1, 1, 7];
        let mut scratch = Vec::new();
        let a = CellHash::of_members(&[NodeId(0), NodeId(1), NodeId(3)], &tags, &mut scratch);
        let b = CellHash::of_members(&[NodeId(3), NodeId(0), NodeId(2)], &tags, &mut scratch);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_distinguishes_multisets() {
        let a = CellHash::of_tags(&mut [1, 1, 2]);
        let b = CellHash::of_tags(&mut [1, 2, 2]);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_lowercase_hex() {
        // SHA-256 of the empty input.
        let empty = CellHash::of_tags(&mut []);
        assert_eq!(
            empty.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
