//! Per-cell ring buffer of recent hashes.

use std::collections::VecDeque;

use crate::hashing::CellHash;

/// Fixed-capacity history of `(tick, hash)` entries, oldest first.
///
/// Pushing into a full history evicts the oldest entry, so the buffer never
/// exceeds its capacity.
#[derive(Debug, Clone)]
pub struct HashHistory {
    capacity: usize,
    entries: VecDeque<(u64, CellHash)>,
}

impl HashHistory {
    /// Create an empty history. A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Ticks since the most recent earlier entry equal to `hash`.
    ///
    /// Returns `None` when the hash is not in the history.
    pub fn period_of(&self, tick: u64, hash: &CellHash) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|(_, h)| h == hash)
            .map(|&(seen, _)| tick.saturating_sub(seen))
    }

    /// Record `hash` for `tick`, evicting the oldest entry when full.
    pub fn push(&mut self, tick: u64, hash: CellHash) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((tick, hash));
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tick of the most recent entry.
    pub fn last_tick(&self) -> Option<u64> {
        self.entries.back().map(|&(tick, _)| tick)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> CellHash {
        CellHash([byte; 32])
    }

    #[test]
    fn most_recent_match_wins() {
        let mut history = HashHistory::new(8);
        history.push(1, hash(1));
        history.push(2, hash(2));
        history.push(3, hash(1));
        assert_eq!(history.period_of(5, &hash(1)), Some(2));
        assert_eq!(history.period_of(5, &hash(2)), Some(3));
        assert_eq!(history.period_of(5, &hash(9)), None);
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut history = HashHistory::new(3);
        for tick in 1..=10 {
            history.push(tick, hash(u8::try_from(tick).unwrap()));
            assert!(history.len() <= 3);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.period_of(11, &hash(7)), None);
        assert_eq!(history.period_of(11, &hash(8)), Some(3));
        assert_eq!(history.last_tick(), Some(10));
    }

    #[test]
    fn zero_capacity_holds_one_entry() {
        let mut history = HashHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(1, hash(1));
        history.push(2, hash(2));
        assert_eq!(history.len(), 1);
    }
}
