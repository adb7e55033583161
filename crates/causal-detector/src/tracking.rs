//! Particle identity across ticks.
//!
//! A candidate cluster inherits the ID of a previous particle when their
//! cell sets overlap by more than `overlap_threshold` of *both* sizes. With
//! the default threshold of 0.5 that is a strict majority both ways, which
//! makes every match unique. Lower thresholds can allow several matches;
//! the tracker then gives each candidate, in cluster order, the unclaimed
//! previous particle with the largest overlap (smallest ID on ties).
//!
//! Particles without a successor decay into a bounded archive.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use causal_site::CellGrid;
use causal_types::{
    ArchivedParticle, CellId, Kinematics, ParticleId, ParticleRecord, TickEvents, TickRecord,
    Vec3,
};
use tracing::debug;

use crate::clustering::Cluster;
use crate::kinematics;

/// Tracker tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerParams {
    /// Fraction of both cell sets the overlap must exceed, in `[0, 1)`.
    pub overlap_threshold: f64,
    /// Maximum number of archived particles kept.
    pub archive_capacity: usize,
    /// Maximum number of centroids kept per live particle.
    pub track_length: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.5,
            archive_capacity: 1024,
            track_length: 200,
        }
    }
}

/// A live particle.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedParticle {
    /// Stable identifier.
    pub id: ParticleId,
    /// Period at the most recent detection.
    pub period: u64,
    /// Tick of first detection.
    pub first_seen_tick: u64,
    /// Tick of the most recent detection.
    pub last_seen_tick: u64,
    /// Consecutive ticks tracked, inclusive.
    pub lifetime: u64,
    /// Member cells at the most recent detection.
    pub cells: BTreeSet<CellId>,
    /// Centroid and radius at the most recent detection.
    pub kinematics: Kinematics,
    /// Largest cell count seen so far.
    pub peak_cells: usize,
    track: VecDeque<Vec3>,
}

impl TrackedParticle {
    /// Recent centroids, oldest first.
    pub fn track(&self) -> impl Iterator<Item = &Vec3> {
        self.track.iter()
    }

    fn record(&self) -> ParticleRecord {
        ParticleRecord {
            id: self.id,
            period: self.period,
            lifetime: self.lifetime,
            num_cells: self.cells.len(),
            kinematics: self.kinematics,
            track: self.track.iter().copied().collect(),
        }
    }

    fn push_track(&mut self, centroid: Vec3, limit: usize) {
        while self.track.len() >= limit.max(1) {
            self.track.pop_front();
        }
        self.track.push_back(centroid);
    }

    fn into_archive(self) -> ArchivedParticle {
        ArchivedParticle {
            id: self.id,
            period: self.period,
            first_seen_tick: self.first_seen_tick,
            last_seen_tick: self.last_seen_tick,
            lifetime: self.lifetime,
            peak_cells: self.peak_cells,
            track: self.track.into_iter().collect(),
        }
    }
}

/// Assigns particle IDs across ticks and keeps the archive.
#[derive(Debug, Clone)]
pub struct ParticleTracker {
    params: TrackerParams,
    next_id: ParticleId,
    active: BTreeMap<ParticleId, TrackedParticle>,
    archive: VecDeque<ArchivedParticle>,
}

impl ParticleTracker {
    /// Create a tracker with no particles.
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            next_id: ParticleId(0),
            active: BTreeMap::new(),
            archive: VecDeque::new(),
        }
    }

    /// Match this tick's clusters against the previous particles and
    /// produce the tick record.
    pub fn update(&mut self, tick: u64, clusters: Vec<Cluster>, grid: &CellGrid) -> TickRecord {
        let mut current = BTreeMap::new();
        let mut spawned = Vec::new();

        for cluster in clusters {
            let kinematics = kinematics::compute(grid, &cluster.cells);
            let particle = self
                .best_match(&cluster.cells)
                .and_then(|id| self.active.remove(&id))
                .map(|mut p| {
                    p.lifetime = p.lifetime.saturating_add(1);
                    p.period = cluster.period;
                    p.last_seen_tick = tick;
                    p.peak_cells = p.peak_cells.max(cluster.cells.len());
                    p.cells = cluster.cells.clone();
                    p.kinematics = kinematics;
                    p
                });
            let mut particle = particle.unwrap_or_else(|| {
                let id = self.next_id;
                self.next_id = id.next();
                spawned.push(id);
                TrackedParticle {
                    id,
                    period: cluster.period,
                    first_seen_tick: tick,
                    last_seen_tick: tick,
                    lifetime: 1,
                    peak_cells: cluster.cells.len(),
                    cells: cluster.cells,
                    kinematics,
                    track: VecDeque::new(),
                }
            });
            particle.push_track(kinematics.centroid, self.params.track_length);
            current.insert(particle.id, particle);
        }

        let decayed_particles = core::mem::replace(&mut self.active, current);
        let decayed: Vec<ParticleId> = decayed_particles.keys().copied().collect();
        for particle in decayed_particles.into_values() {
            self.archive_particle(particle);
        }
        spawned.sort_unstable();

        if !spawned.is_empty() || !decayed.is_empty() {
            debug!(
                tick,
                spawned = spawned.len(),
                decayed = decayed.len(),
                active = self.active.len(),
                "particle population changed"
            );
        }

        TickRecord {
            tick,
            events: TickEvents { spawned, decayed },
            particles: self.active.values().map(TrackedParticle::record).collect(),
            memory_density: None,
        }
    }

    /// The unclaimed previous particle that `cells` may inherit from.
    fn best_match(&self, cells: &BTreeSet<CellId>) -> Option<ParticleId> {
        let threshold = self.params.overlap_threshold;
        self.active
            .values()
            .filter_map(|p| {
                let overlap = p.cells.intersection(cells).count();
                overlaps_enough(overlap, p.cells.len(), cells.len(), threshold)
                    .then_some((overlap, p.id))
            })
            .max_by_key(|&(overlap, id)| (overlap, Reverse(id)))
            .map(|(_, id)| id)
    }

    fn archive_particle(&mut self, particle: TrackedParticle) {
        if self.params.archive_capacity == 0 {
            return;
        }
        while self.archive.len() >= self.params.archive_capacity {
            self.archive.pop_front();
        }
        self.archive.push_back(particle.into_archive());
    }

    /// Live particles ordered by ID.
    pub fn active(&self) -> impl Iterator<Item = &TrackedParticle> {
        self.active.values()
    }

    /// Number of live particles.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Archived particles, oldest decay first.
    pub fn archived(&self) -> impl Iterator<Item = &ArchivedParticle> {
        self.archive.iter()
    }

    /// Summaries of every live particle, as if they decayed now.
    pub fn active_summaries(&self) -> Vec<ArchivedParticle> {
        self.active.values().cloned().map(TrackedParticle::into_archive).collect()
    }
}

/// `overlap > threshold * |previous|` and `overlap > threshold * |candidate|`.
#[allow(clippy::cast_precision_loss)]
fn overlaps_enough(overlap: usize, previous: usize, candidate: usize, threshold: f64) -> bool {
    let overlap = overlap as f64;
    overlap > threshold * previous as f64 && overlap > threshold * candidate as f64
}
