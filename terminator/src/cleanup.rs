/// Leftover removal after termination.
///
/// Runs only once every target has been released: files may still be locked
/// by processes that are shutting down.
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::progress::Reporter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    Removed,
    NotFound,
    Failed,
}

/// Result of one removal attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupEntry {
    pub path: PathBuf,
    pub status: CleanupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Removes every path in `paths`, in order. A failure on one path never stops
/// the attempts on the rest.
pub fn remove_leftovers(paths: &[PathBuf], reporter: &Reporter) -> Vec<CleanupEntry> {
    paths
        .iter()
        .map(|path| {
            let (status, error) = match remove_path(path, reporter) {
                Ok(true) => (CleanupStatus::Removed, None),
                Ok(false) => (CleanupStatus::NotFound, None),
                Err(e) => {
                    tracing::warn!("failed to remove {}: {e}", path.display());
                    reporter.line(format!("Failed to remove {}: {e}", path.display()));
                    (CleanupStatus::Failed, Some(e.to_string()))
                }
            };
            CleanupEntry {
                path: path.clone(),
                status,
                error,
            }
        })
        .collect()
}

/// Returns `Ok(false)` if nothing exists at `path`.
fn remove_path(path: &Path, reporter: &Reporter) -> io::Result<bool> {
    // symlink_metadata so a link to a directory is unlinked, not emptied.
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    reporter.line(format!("Removing {}", path.display()));
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(true)
}
