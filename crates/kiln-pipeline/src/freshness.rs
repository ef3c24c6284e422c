//! Mtime-based freshness checks for incremental image conversion.

use std::path::Path;
use std::time::SystemTime;

/// Modification time of a file, `None` when missing or unreadable.
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Check if `output` exists and is not older than `source_mtime`.
pub fn is_output_fresh(output: &Path, source_mtime: Option<SystemTime>) -> bool {
    let Some(source_time) = source_mtime else {
        return false;
    };

    get_mtime(output).is_some_and(|output_time| output_time >= source_time)
}

/// Check if `output` is up to date with respect to `source`.
pub fn is_fresh(source: &Path, output: &Path) -> bool {
    is_output_fresh(output, get_mtime(source))
}
