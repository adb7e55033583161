//! Configuration loading and typed config structures for the causal site
//! simulation.
//!
//! The canonical configuration lives in `causal-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use causal_detector::{DetectorParams, TrackerParams};
use causal_site::{CellGridParams, GeneratorParams, LayoutParams};
use causal_types::{
    CellAdjacency, DegreeCap, FusionMode, HiddenDrive, Layout, NodeCountMode, ParseVariantError,
};
use serde::Deserialize;

use crate::state::StateParams;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration value {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Explanation of what is wrong with it.
        reason: String,
    },

    /// A fusion mode name supplied outside YAML is not recognised.
    #[error("{source}")]
    UnknownFusionMode {
        /// The rejected name.
        #[from]
        source: ParseVariantError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `causal-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run length, seed, hidden layer, and logging cadence.
    #[serde(default)]
    pub simulation: SimulationSection,

    /// Graph generation and layout.
    #[serde(default)]
    pub causal_site: CausalSiteConfig,

    /// Tag alphabet and update rule.
    #[serde(default)]
    pub tags: TagsConfig,

    /// Particle detector parameters.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Output files.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CAUSAL_OUTPUT_DIR` overrides `output.directory`
    /// - `CAUSAL_SEED` overrides `simulation.seed`
    /// - `CAUSAL_FUSION_MODE` overrides `tags.fusion_mode`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and
    /// [`ConfigError::Invalid`] or [`ConfigError::UnknownFusionMode`] for a
    /// malformed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override fields from the process environment when set.
    ///
    /// # Errors
    ///
    /// Returns an error when an override value cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparsable seed and
    /// [`ConfigError::UnknownFusionMode`] for an unknown mode name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("CAUSAL_OUTPUT_DIR") {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(seed) = lookup("CAUSAL_SEED") {
            self.simulation.seed = seed.trim().parse().map_err(|_err| ConfigError::Invalid {
                field: "simulation.seed",
                reason: format!("'{seed}' is not an unsigned integer"),
            })?;
        }
        if let Some(mode) = lookup("CAUSAL_FUSION_MODE") {
            self.tags.fusion_mode = mode.trim().parse()?;
        }
        Ok(())
    }

    /// Check cross-field and range constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let site = &self.causal_site;
        let checks: [(bool, &'static str, &str); 13] = [
            (self.tags.alphabet_size_q >= 2, "tags.alphabet_size_q", "must be at least 2"),
            (self.detector.grid_size >= 1, "detector.grid_size", "must be at least 1"),
            (
                self.detector.max_history_length >= 1,
                "detector.max_history_length",
                "must be at least 1",
            ),
            (
                self.detector.min_loop_period >= 1,
                "detector.min_loop_period",
                "must be at least 1",
            ),
            (
                self.detector.min_particle_size >= 1,
                "detector.min_particle_size",
                "must be at least 1",
            ),
            (
                self.simulation.log_interval >= 1,
                "simulation.log_interval",
                "must be at least 1",
            ),
            (site.layers >= 1, "causal_site.layers", "must be at least 1"),
            (
                site.max_lookback_layers >= 1,
                "causal_site.max_lookback_layers",
                "must be at least 1",
            ),
            (
                (0.0..=1.0).contains(&site.edge_probability),
                "causal_site.edge_probability",
                "must lie in [0, 1]",
            ),
            (
                site.avg_nodes_per_layer.is_finite() && site.avg_nodes_per_layer >= 0.0,
                "causal_site.avg_nodes_per_layer",
                "must be a finite, non-negative number",
            ),
            (
                (0.0..1.0).contains(&self.detector.overlap_threshold),
                "detector.overlap_threshold",
                "must lie in [0, 1)",
            ),
            (
                self.simulation
                    .hide_layer_index
                    .is_none_or(|layer| layer < site.layers),
                "simulation.hide_layer_index",
                "must name an existing layer",
            ),
            (
                self.simulation.hidden_drive == HiddenDrive::Fusion
                    || self.simulation.hide_layer_index.is_some(),
                "simulation.hidden_drive",
                "affine_clock needs a hide_layer_index",
            ),
        ];
        for (ok, field, reason) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: reason.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Parameters for [`causal_site::generate`].
    pub const fn generator_params(&self) -> GeneratorParams {
        GeneratorParams {
            layers: self.causal_site.layers,
            avg_nodes_per_layer: self.causal_site.avg_nodes_per_layer,
            node_count: self.causal_site.node_count,
            edge_probability: self.causal_site.edge_probability,
            edge_distance_decay: self.causal_site.edge_distance_decay,
            max_lookback_layers: self.causal_site.max_lookback_layers,
            max_degree: self.tags.max_out_degree_r,
            degree_cap: self.tags.degree_cap,
            seed: self.simulation.seed,
        }
    }

    /// Parameters for [`StateManager::new`](crate::state::StateManager::new).
    pub const fn state_params(&self) -> StateParams {
        StateParams {
            q: self.tags.alphabet_size_q,
            fusion_mode: self.tags.fusion_mode,
            include_self: self.tags.include_self,
            hidden_noise: self.simulation.hidden_noise,
            hidden_drive: self.simulation.hidden_drive,
            hidden_layer: self.simulation.hide_layer_index,
            seed: self.simulation.seed,
            memory_window: self.detector.memory_window,
        }
    }

    /// Parameters for [`causal_site::compute_positions`].
    pub const fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            layout: self.causal_site.layout,
            node_spacing: self.causal_site.node_spacing,
            layer_depth: self.causal_site.layer_depth,
        }
    }

    /// Parameters for [`causal_site::CellGrid::build`].
    pub const fn cell_grid_params(&self) -> CellGridParams {
        CellGridParams {
            grid_size: self.detector.grid_size,
            adjacency: self.detector.adjacency,
            hidden_layer: self.simulation.hide_layer_index,
        }
    }

    /// Parameters for [`causal_detector::ParticleDetector::new`].
    pub const fn detector_params(&self) -> DetectorParams {
        let tracker = self.detector.tracker_params();
        DetectorParams {
            max_history_length: self.detector.max_history_length,
            min_loop_period: self.detector.min_loop_period,
            min_particle_size: self.detector.min_particle_size,
            overlap_threshold: tracker.overlap_threshold,
            archive_capacity: tracker.archive_capacity,
            track_length: tracker.track_length,
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSection {
    /// Number of ticks to run.
    #[serde(default = "default_total_ticks")]
    pub total_ticks: u64,

    /// Seed for graph generation and hidden-layer noise.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Layer excluded from cell hashes (default 0); `null` hides nothing.
    #[serde(default = "default_hide_layer_index")]
    pub hide_layer_index: Option<u32>,

    /// Ticks between console summaries.
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,

    /// Redraw source-layer tags at random every tick.
    #[serde(default)]
    pub hidden_noise: bool,

    /// How the hidden layer evolves.
    #[serde(default)]
    pub hidden_drive: HiddenDrive,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            total_ticks: default_total_ticks(),
            seed: default_seed(),
            hide_layer_index: default_hide_layer_index(),
            log_interval: default_log_interval(),
            hidden_noise: false,
            hidden_drive: HiddenDrive::default(),
        }
    }
}

/// Graph generation and layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CausalSiteConfig {
    /// Number of layers.
    #[serde(default = "default_layers")]
    pub layers: u32,

    /// Mean nodes per layer.
    #[serde(default = "default_avg_nodes_per_layer")]
    pub avg_nodes_per_layer: f64,

    /// Poisson or fixed layer sizes.
    #[serde(default)]
    pub node_count: NodeCountMode,

    /// Probability of each candidate edge.
    #[serde(default = "default_edge_probability")]
    pub edge_probability: f64,

    /// Divide the edge probability by the layer distance.
    #[serde(default)]
    pub edge_distance_decay: bool,

    /// How far back predecessors may sit.
    #[serde(default = "default_max_lookback_layers")]
    pub max_lookback_layers: u32,

    /// Node arrangement within a layer.
    #[serde(default)]
    pub layout: Layout,

    /// Distance between layers.
    #[serde(default = "default_layer_depth")]
    pub layer_depth: f64,

    /// Distance between nodes of a layer.
    #[serde(default = "default_node_spacing")]
    pub node_spacing: f64,
}

impl Default for CausalSiteConfig {
    fn default() -> Self {
        Self {
            layers: default_layers(),
            avg_nodes_per_layer: default_avg_nodes_per_layer(),
            node_count: NodeCountMode::default(),
            edge_probability: default_edge_probability(),
            edge_distance_decay: false,
            max_lookback_layers: default_max_lookback_layers(),
            layout: Layout::default(),
            layer_depth: default_layer_depth(),
            node_spacing: default_node_spacing(),
        }
    }
}

/// Tag alphabet and fusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagsConfig {
    /// Alphabet size `q`.
    #[serde(default = "default_alphabet_size_q")]
    pub alphabet_size_q: u32,

    /// Degree bound `R`.
    #[serde(rename = "max_out_degree_R", default = "default_max_out_degree_r")]
    pub max_out_degree_r: u32,

    /// Which endpoint `R` bounds.
    #[serde(default)]
    pub degree_cap: DegreeCap,

    /// Fusion rule.
    #[serde(default)]
    pub fusion_mode: FusionMode,

    /// Feed a node's own prior tag into its fusion rule.
    #[serde(default)]
    pub include_self: bool,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            alphabet_size_q: default_alphabet_size_q(),
            max_out_degree_r: default_max_out_degree_r(),
            degree_cap: DegreeCap::default(),
            fusion_mode: FusionMode::default(),
            include_self: false,
        }
    }
}

/// Particle detector parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectorConfig {
    /// Cells per axis.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Hash history capacity per cell.
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,

    /// Smallest period that counts as a loop.
    #[serde(default = "default_min_loop_period")]
    pub min_loop_period: u64,

    /// Smallest cluster reported as a particle.
    #[serde(default = "default_min_particle_size")]
    pub min_particle_size: usize,

    /// Cell adjacency rule for clustering.
    #[serde(default)]
    pub adjacency: CellAdjacency,

    /// Identity matching threshold.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Ceiling of the per-node memory density counter.
    #[serde(default = "default_memory_window")]
    pub memory_window: u16,

    /// Maximum archived particles.
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,

    /// Maximum world-line length per particle.
    #[serde(default = "default_track_length")]
    pub track_length: usize,
}

impl DetectorConfig {
    const fn tracker_params(&self) -> TrackerParams {
        TrackerParams {
            overlap_threshold: self.overlap_threshold,
            archive_capacity: self.archive_capacity,
            track_length: self.track_length,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            max_history_length: default_max_history_length(),
            min_loop_period: default_min_loop_period(),
            min_particle_size: default_min_particle_size(),
            adjacency: CellAdjacency::default(),
            overlap_threshold: default_overlap_threshold(),
            memory_window: default_memory_window(),
            archive_capacity: default_archive_capacity(),
            track_length: default_track_length(),
        }
    }
}

/// Output file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Write the static graph and tick log.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding both files.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Static graph file name.
    #[serde(default = "default_static_file")]
    pub static_file: String,

    /// Tick log file name.
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Ticks between per-node memory density snapshots in the tick log;
    /// 0 writes none.
    #[serde(default = "default_memory_density_interval")]
    pub memory_density_interval: u64,
}

impl OutputConfig {
    /// Full path of the static graph file.
    pub fn static_path(&self) -> PathBuf {
        self.directory.join(&self.static_file)
    }

    /// Full path of the tick log file.
    pub fn log_path(&self) -> PathBuf {
        self.directory.join(&self.log_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_output_directory(),
            static_file: default_static_file(),
            log_file: default_log_file(),
            memory_density_interval: default_memory_density_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_total_ticks() -> u64 {
    1000
}

const fn default_seed() -> u64 {
    42
}

const fn default_hide_layer_index() -> Option<u32> {
    Some(0)
}

const fn default_log_interval() -> u64 {
    100
}

const fn default_layers() -> u32 {
    50
}

const fn default_avg_nodes_per_layer() -> f64 {
    40.0
}

const fn default_edge_probability() -> f64 {
    0.1
}

const fn default_max_lookback_layers() -> u32 {
    1
}

const fn default_layer_depth() -> f64 {
    6.0
}

const fn default_node_spacing() -> f64 {
    5.0
}

const fn default_alphabet_size_q() -> u32 {
    16
}

const fn default_max_out_degree_r() -> u32 {
    2
}

const fn default_grid_size() -> u32 {
    12
}

const fn default_max_history_length() -> usize {
    10_000
}

const fn default_min_loop_period() -> u64 {
    5
}

const fn default_min_particle_size() -> usize {
    2
}

const fn default_overlap_threshold() -> f64 {
    0.5
}

const fn default_memory_window() -> u16 {
    1024
}

const fn default_archive_capacity() -> usize {
    1024
}

const fn default_track_length() -> usize {
    200
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("results")
}

fn default_static_file() -> String {
    "static_universe.json".to_owned()
}

fn default_log_file() -> String {
    "simulation_log.jsonl".to_owned()
}

const fn default_memory_density_interval() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
