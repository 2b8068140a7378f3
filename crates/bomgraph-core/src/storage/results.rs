//! JSON persistence of resolved trees.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use bomgraph_engine::engine::Reference;

use crate::error::Result;

#[derive(Clone, Debug)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResultStore { path: path.into() }
    }

    /// Overwrite the log with `results`.
    pub fn save(&self, results: &[Reference]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, results)?;
        tracing::info!(path = %self.path.display(), results = results.len(), "saved results");
        Ok(())
    }
}

/// Read a results file that must exist and parse.
pub fn read_results(path: &Path) -> Result<Vec<Reference>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
