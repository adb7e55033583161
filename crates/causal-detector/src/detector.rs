//! The per-tick detection pipeline.
//!
//! # Pipeline
//!
//! 1. Hash every cell that has visible members.
//! 2. Look the hash up in the cell's history; the most recent match gives
//!    the period, and the cell loops when the period reaches
//!    `min_loop_period`.
//! 3. Push the hash into the history (after the lookup, so a cell never
//!    matches its own current entry).
//! 4. Cluster looping cells and hand the clusters to the tracker.
//!
//! The detector only reads tags and the static cell grid. It owns its
//! histories and its tracker and never touches graph or state.

use std::collections::BTreeMap;

use causal_site::CellGrid;
use causal_types::{ArchivedParticle, CellId, Tag, TickRecord};
use tracing::trace;

use crate::clustering::find_clusters;
use crate::error::DetectorError;
use crate::hashing::CellHash;
use crate::history::HashHistory;
use crate::tracking::{ParticleTracker, TrackedParticle, TrackerParams};

/// Detector tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    /// Capacity of each cell's hash history.
    pub max_history_length: usize,
    /// Smallest period that counts as a loop.
    pub min_loop_period: u64,
    /// Smallest cluster (in cells) reported as a particle.
    pub min_particle_size: usize,
    /// Identity matching threshold, in `[0, 1)`.
    pub overlap_threshold: f64,
    /// Maximum number of archived particles.
    pub archive_capacity: usize,
    /// Maximum world-line length per live particle.
    pub track_length: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            max_history_length: 10_000,
            min_loop_period: 5,
            min_particle_size: 2,
            overlap_threshold: 0.5,
            archive_capacity: 1024,
            track_length: 200,
        }
    }
}

impl DetectorParams {
    /// Check every parameter range.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidParameters`] naming the first bad
    /// parameter.
    pub fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |parameter, reason: &str| DetectorError::InvalidParameters {
            parameter,
            reason: reason.to_owned(),
        };
        if self.max_history_length == 0 {
            return Err(invalid("max_history_length", "must be at least 1"));
        }
        if self.min_loop_period == 0 {
            return Err(invalid("min_loop_period", "must be at least 1"));
        }
        if self.min_particle_size == 0 {
            return Err(invalid("min_particle_size", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.overlap_threshold) {
            return Err(invalid("overlap_threshold", "must lie in [0, 1)"));
        }
        Ok(())
    }

    fn tracker(&self) -> TrackerParams {
        TrackerParams {
            overlap_threshold: self.overlap_threshold,
            archive_capacity: self.archive_capacity,
            track_length: self.track_length,
        }
    }
}

/// Everything detected at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The observed tick.
    pub tick: u64,
    /// Looping cells and their periods.
    pub looping: BTreeMap<CellId, u64>,
    /// The tick log record.
    pub record: TickRecord,
}

impl Detection {
    /// Number of looping cells.
    pub fn looping_cells(&self) -> usize {
        self.looping.len()
    }
}

/// Stateful particle detector over a fixed cell grid.
#[derive(Debug, Clone)]
pub struct ParticleDetector {
    grid: CellGrid,
    params: DetectorParams,
    histories: BTreeMap<CellId, HashHistory>,
    tracker: ParticleTracker,
    last_tick: Option<u64>,
    scratch: Vec<Tag>,
}

impl ParticleDetector {
    /// Create a detector. Only cells with visible members get a history.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidParameters`] for out-of-range
    /// parameters.
    pub fn new(grid: CellGrid, params: DetectorParams) -> Result<Self, DetectorError> {
        params.validate()?;
        let histories = grid
            .cells()
            .filter(|cell| !cell.visible.is_empty())
            .map(|cell| (cell.id, HashHistory::new(params.max_history_length)))
            .collect();
        Ok(Self {
            grid,
            tracker: ParticleTracker::new(params.tracker()),
            params,
            histories,
            last_tick: None,
            scratch: Vec::new(),
        })
    }

    /// Observe the tag vector at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::TagCountMismatch`] when `tags` does not
    /// cover every node, and [`DetectorError::NonMonotonicTick`] when `tick`
    /// is not later than the previous observation.
    pub fn observe(&mut self, tick: u64, tags: &[Tag]) -> Result<Detection, DetectorError> {
        if tags.len() != self.grid.node_count() {
            return Err(DetectorError::TagCountMismatch {
                expected: self.grid.node_count(),
                actual: tags.len(),
            });
        }
        if let Some(last) = self.last_tick
            && tick <= last
        {
            return Err(DetectorError::NonMonotonicTick { tick, last });
        }
        self.last_tick = Some(tick);

        let mut looping = BTreeMap::new();
        for (&id, history) in &mut self.histories {
            let Some(cell) = self.grid.cell(id) else {
                continue;
            };
            let hash = CellHash::of_members(&cell.visible, tags, &mut self.scratch);
            if let Some(period) = history.period_of(tick, &hash)
                && period >= self.params.min_loop_period
            {
                trace!(tick, cell = %id, period, hash = %hash, "cell state recurred");
                looping.insert(id, period);
            }
            history.push(tick, hash);
        }

        let clusters = find_clusters(&self.grid, &looping, self.params.min_particle_size);
        trace!(
            tick,
            looping = looping.len(),
            clusters = clusters.len(),
            "cells scanned"
        );
        let record = self.tracker.update(tick, clusters, &self.grid);

        Ok(Detection {
            tick,
            looping,
            record,
        })
    }

    /// The static cell grid.
    pub const fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// The validated parameters.
    pub const fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// History of one cell, if it has visible members.
    pub fn history(&self, cell: CellId) -> Option<&HashHistory> {
        self.histories.get(&cell)
    }

    /// Live particles ordered by ID.
    pub fn active(&self) -> impl Iterator<Item = &TrackedParticle> {
        self.tracker.active()
    }

    /// Number of live particles.
    pub fn active_count(&self) -> usize {
        self.tracker.active_count()
    }

    /// Decayed particles kept in the archive, oldest first.
    pub fn archived(&self) -> impl Iterator<Item = &ArchivedParticle> {
        self.tracker.archived()
    }

    /// Summaries of the live particles, in archive form.
    pub fn active_summaries(&self) -> Vec<ArchivedParticle> {
        self.tracker.active_summaries()
    }
}
