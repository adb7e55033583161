//! Drifting affine clocks for the hidden layer.
//!
//! Each hidden node `v` owns coefficients `(a_v, b_v)` with `a_v` a unit
//! mod q and advances as `t -> (a_v * t + b_v) mod q`, reading its own tag
//! from the frozen previous vector. A fixed affine map is eventually
//! periodic, so every [`DRIFT_INTERVAL`] ticks the coefficients move:
//! `b_v += v`, `a_v <- a_v + 1 + v`, stepped forward until it is a unit
//! again.

use causal_types::{NodeId, Tag};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fusion::{gcd, reduce};

/// Ticks between coefficient drifts.
pub const DRIFT_INTERVAL: u64 = 11;

/// Separates the clock stream from the generation and noise streams.
const CLOCK_STREAM: u64 = 0x636C_6F63_6B5F_7631;

/// Coefficients of one hidden node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffineClock {
    /// The driven node.
    pub node: NodeId,
    /// Multiplier, a unit mod q.
    pub multiplier: u64,
    /// Additive term in `0..q`.
    pub offset: u64,
}

/// The clocks of every hidden node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenClocks {
    q: u64,
    clocks: Vec<AffineClock>,
}

impl HiddenClocks {
    /// Draw initial coefficients for `nodes` from `seed`. Multipliers are
    /// drawn from `2..q` (just 1 when `q <= 2`) and stepped to the next unit.
    pub fn new(nodes: &[NodeId], q: u32, seed: u64) -> Self {
        let q = u64::from(q.max(1));
        let mut rng = StdRng::seed_from_u64(seed ^ CLOCK_STREAM);
        let clocks = nodes
            .iter()
            .map(|&node| {
                let drawn = if q > 2 { rng.random_range(2..q) } else { 1 };
                AffineClock {
                    node,
                    multiplier: next_unit(drawn, q),
                    offset: rng.random_range(0..q),
                }
            })
            .collect();
        Self { q, clocks }
    }

    /// Advance every hidden node for `tick`, reading `current` and writing
    /// `next`. Coefficients drift first on multiples of [`DRIFT_INTERVAL`].
    pub fn advance(&mut self, tick: u64, current: &[Tag], next: &mut [Tag]) {
        let q = self.q;
        let drift = tick.checked_rem(DRIFT_INTERVAL) == Some(0);
        for clock in &mut self.clocks {
            let id = u64::from(clock.node.into_inner());
            if drift {
                clock.offset = reduce(clock.offset.saturating_add(reduce(id, q)), q);
                let stepped = reduce(
                    clock.multiplier.saturating_add(1).saturating_add(reduce(id, q)),
                    q,
                );
                clock.multiplier = next_unit(stepped, q);
            }
            let (Some(&tag), Some(slot)) =
                (current.get(clock.node.index()), next.get_mut(clock.node.index()))
            else {
                continue;
            };
            let value = reduce(
                clock
                    .multiplier
                    .saturating_mul(u64::from(tag))
                    .saturating_add(clock.offset),
                q,
            );
            // value < q <= u32::MAX
            *slot = Tag::try_from(value).unwrap_or(0);
        }
    }

    /// Current coefficients, in hidden-layer order.
    pub fn clocks(&self) -> &[AffineClock] {
        &self.clocks
    }
}

/// The first unit mod q at or after `start`, wrapping `0` to `1`.
fn next_unit(start: u64, q: u64) -> u64 {
    let mut candidate = reduce(start, q).max(1);
    while gcd(candidate, q) != 1 {
        candidate = reduce(candidate.saturating_add(1), q).max(1);
    }
    candidate
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn nodes(n: u32) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    #[test]
    fn multipliers_start_as_units() {
        for q in [2_u32, 3, 4, 12, 16, 30] {
            let clocks = HiddenClocks::new(&nodes(20), q, 5);
            for clock in clocks.clocks() {
                assert_eq!(gcd(clock.multiplier, u64::from(q)), 1, "q={q}");
                assert!(clock.offset < u64::from(q));
            }
        }
    }

    #[test]
    fn same_seed_same_clocks() {
        let a = HiddenClocks::new(&nodes(8), 16, 9);
        let b = HiddenClocks::new(&nodes(8), 16, 9);
        let c = HiddenClocks::new(&nodes(8), 16, 10);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn advance_applies_the_affine_map() {
        let mut clocks = HiddenClocks::new(&[NodeId(1)], 7, 3);
        let AffineClock {
            multiplier, offset, ..
        } = clocks.clocks()[0];
        let current: [Tag; 2] = [0, 4];
        let mut next = current;
        clocks.advance(1, &current, &mut next);
        assert_eq!(u64::from(next[1]), (multiplier * 4 + offset) % 7);
        assert_eq!(next[0], 0);
    }

    #[test]
    fn coefficients_drift_on_the_interval() {
        let mut clocks = HiddenClocks::new(&nodes(4), 16, 1);
        let start = clocks.clone();
        let tags = [0_u32; 4];
        let mut next = tags;
        for tick in 1..DRIFT_INTERVAL {
            clocks.advance(tick, &tags, &mut next);
        }
        assert_eq!(clocks, start);

        clocks.advance(DRIFT_INTERVAL, &tags, &mut next);
        let (before, after) = (start.clocks()[3], clocks.clocks()[3]);
        assert_eq!(after.offset, (before.offset + 3) % 16);
        assert_eq!(after.multiplier, next_unit(before.multiplier + 4, 16));
        assert!(clocks.clocks().iter().all(|c| gcd(c.multiplier, 16) == 1));
    }

    #[test]
    fn next_unit_skips_non_units_and_zero() {
        assert_eq!(next_unit(4, 16), 5);
        assert_eq!(next_unit(16, 16), 1);
        assert_eq!(next_unit(6, 9), 7);
        assert_eq!(next_unit(0, 2), 1);
        assert_eq!(next_unit(5, 1), 1);
    }
}
