//! Output files: the static graph document and the per-tick log.
//!
//! The static graph is written once before the first tick. The tick log is
//! appended by [`JsonlLogCallback`], one [`TickRecord`] per line, so a
//! visualizer can stream it while the run is still going.
//!
//! [`TickRecord`]: causal_types::TickRecord

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use causal_core::runner::{CallbackError, TickCallback};
use causal_core::tick::{Simulation, TickSummary};
use causal_types::StaticGraph;
use tracing::{debug, info};

use crate::error::EngineError;

/// Create `path` and its parent directories for writing.
fn create_file(path: &Path) -> Result<BufWriter<File>, EngineError> {
    let io_error = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    File::create(path).map(BufWriter::new).map_err(io_error)
}

/// Write the static graph document to `path`.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the file cannot be written and
/// [`EngineError::Json`] if serialization fails.
pub fn write_static_graph(path: &Path, graph: &StaticGraph) -> Result<(), EngineError> {
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, graph)?;
    writer.flush().map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Static graph written"
    );
    Ok(())
}

/// Tick callback that appends each tick record as one JSON line.
pub struct JsonlLogCallback<W: Write> {
    writer: W,
    lines: u64,
}

impl JsonlLogCallback<BufWriter<File>> {
    /// Create (or truncate) the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let writer = create_file(path)?;
        debug!(path = %path.display(), "Tick log opened");
        Ok(Self::new(writer))
    }
}

impl<W: Write> JsonlLogCallback<W> {
    /// Wrap an arbitrary writer.
    pub const fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Number of records written so far.
    pub const fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush and return the writer.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the final flush.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> TickCallback for JsonlLogCallback<W> {
    fn on_tick(
        &mut self,
        summary: &TickSummary,
        _simulation: &Simulation,
    ) -> Result<(), CallbackError> {
        serde_json::to_writer(&mut self.writer, &summary.record).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.lines = self.lines.saturating_add(1);
        Ok(())
    }
}

/// Paths of both output files, or `None` when output is disabled.
pub fn output_paths(config: &causal_core::SimulationConfig) -> Option<(PathBuf, PathBuf)> {
    config
        .output
        .enabled
        .then(|| (config.output.static_path(), config.output.log_path()))
}
