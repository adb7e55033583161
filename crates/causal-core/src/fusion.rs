//! Fusion rules: how predecessor tags combine into a node's next tag.
//!
//! Every rule is a pure function of the node ID and its ordered input tuple
//! (predecessor tags by ascending predecessor ID, followed by the node's own
//! prior tag when self-inclusion is on). No rule keeps state between calls,
//! so a tick can evaluate nodes in any order.
//!
//! All arithmetic happens on `u64` values below `q <= u32::MAX`, so every
//! intermediate product fits without overflow.

use causal_types::{FusionMode, NodeId, Tag};

/// A configured fusion rule over the alphabet `0..q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionRule {
    /// `(t_0 + ... + t_{k-1}) mod q`.
    SumModQ {
        /// Alphabet size.
        q: u32,
    },
    /// `(s^2 + sum_{i<j} t_i * t_j) mod q` with `s` the sum mod q.
    Quadratic {
        /// Alphabet size.
        q: u32,
    },
    /// `(m_v * t_0 + b_v + h_v(t_1..t_{k-1})) mod q` with `m_v` a unit mod q.
    ///
    /// For a fixed tail the map over `t_0` is a bijection, so every output
    /// has exactly `q^(k-1)` preimages: the fewest collisions any rule from
    /// `q^k` inputs to `q` outputs can have.
    Injective {
        /// Alphabet size.
        q: u32,
    },
}

impl FusionRule {
    /// Build the rule for `mode` over an alphabet of size `q`.
    pub const fn new(mode: FusionMode, q: u32) -> Self {
        match mode {
            FusionMode::SumModQ => Self::SumModQ { q },
            FusionMode::Quadratic => Self::Quadratic { q },
            FusionMode::Injective => Self::Injective { q },
        }
    }

    /// The alphabet size.
    pub const fn q(self) -> u32 {
        match self {
            Self::SumModQ { q } | Self::Quadratic { q } | Self::Injective { q } => q,
        }
    }

    /// The configuration mode this rule implements.
    pub const fn mode(self) -> FusionMode {
        match self {
            Self::SumModQ { .. } => FusionMode::SumModQ,
            Self::Quadratic { .. } => FusionMode::Quadratic,
            Self::Injective { .. } => FusionMode::Injective,
        }
    }

    /// Fuse the ordered input tuple of `node`.
    ///
    /// Returns `None` for an empty tuple; such nodes keep their tag.
    pub fn fuse(self, node: NodeId, inputs: &[Tag]) -> Option<Tag> {
        let (&first, tail) = inputs.split_first()?;
        let q = u64::from(self.q().max(1));
        let value = match self {
            Self::SumModQ { .. } => sum_mod(inputs, q),
            Self::Quadratic { .. } => {
                let mut prefix = 0;
                let mut pairs = 0;
                for &tag in inputs {
                    let tag = reduce(u64::from(tag), q);
                    pairs = add_mod(pairs, mul_mod(prefix, tag, q), q);
                    prefix = add_mod(prefix, tag, q);
                }
                add_mod(mul_mod(prefix, prefix, q), pairs, q)
            }
            Self::Injective { .. } => {
                let coefficients = NodeCoefficients::derive(node, q);
                let head = mul_mod(coefficients.multiplier, reduce(u64::from(first), q), q);
                let mixed = reduce(tail_mix(coefficients.seed, tail), q);
                add_mod(add_mod(head, coefficients.offset, q), mixed, q)
            }
        };
        // value < q <= u32::MAX
        Some(Tag::try_from(value).unwrap_or(0))
    }
}

/// Per-node constants of the injective rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeCoefficients {
    /// Unit mod q.
    multiplier: u64,
    /// Offset in `0..q`.
    offset: u64,
    /// Seed of the tail mix.
    seed: u64,
}

impl NodeCoefficients {
    fn derive(node: NodeId, q: u64) -> Self {
        let seed = splitmix64(u64::from(node.into_inner()) ^ 0xA076_1D64_78BD_642F);
        let offset = reduce(splitmix64(seed), q);
        let span = q.saturating_sub(1).max(1);
        let mut multiplier =
            reduce(splitmix64(seed ^ 0xE703_7ED1_A0B4_28DB), span).saturating_add(1);
        while gcd(multiplier, q) != 1 {
            multiplier = if multiplier >= span {
                1
            } else {
                multiplier.saturating_add(1)
            };
        }
        Self {
            multiplier,
            offset,
            seed,
        }
    }
}

/// Order-sensitive 64-bit mix of the tail positions.
fn tail_mix(seed: u64, tail: &[Tag]) -> u64 {
    let mut acc = seed;
    for (position, &tag) in (1_u64..).zip(tail) {
        acc = splitmix64(acc.rotate_left(7) ^ position.wrapping_shl(40) ^ u64::from(tag));
    }
    acc
}

fn sum_mod(inputs: &[Tag], q: u64) -> u64 {
    inputs
        .iter()
        .fold(0, |acc, &tag| add_mod(acc, reduce(u64::from(tag), q), q))
}

/// `x mod q`, or 0 for `q == 0`.
pub(crate) const fn reduce(x: u64, q: u64) -> u64 {
    match x.checked_rem(q) {
        Some(r) => r,
        None => 0,
    }
}

/// `(a + b) mod q` for `a, b < q <= 2^32`.
const fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    reduce(a.saturating_add(b), q)
}

/// `(a * b) mod q` for `a, b < q <= 2^32`.
const fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    reduce(a.saturating_mul(b), q)
}

pub(crate) const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while let Some(r) = a.checked_rem(b) {
        a = b;
        b = r;
    }
    a
}

/// `SplitMix64` finalizer.
const fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
