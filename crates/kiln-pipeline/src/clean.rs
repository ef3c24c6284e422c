//! Emptying the distribution directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::stage::{Stage, StageError, StageKind, StageReport};

/// Removes everything inside the distribution directory.
pub struct Cleaner;

impl Stage for Cleaner {
    fn kind(&self) -> StageKind {
        StageKind::Clean
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let removed = clean_dir(config.dist_dir())?;
        tracing::debug!("Removed {} entries from {}", removed, config.dist_dir().display());

        Ok(StageReport::new(StageKind::Clean))
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself.
///
/// Returns the number of top-level entries removed; a missing directory is a
/// no-op.
pub fn clean_dir(dir: &Path) -> Result<usize, StageError> {
    if !dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(dir).map_err(clean_error(dir.to_path_buf()))?;
    let mut removed = 0;

    for entry in entries {
        let path = entry.map_err(clean_error(dir.to_path_buf()))?.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(clean_error(path))?;
        removed += 1;
    }

    Ok(removed)
}

fn clean_error(path: PathBuf) -> impl FnOnce(io::Error) -> StageError {
    move |source| StageError::Clean { path, source }
}
