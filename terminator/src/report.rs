use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cleanup::CleanupEntry;
use crate::target::{TerminatedProcess, Termination};
use crate::terminate::TerminationReport;

/// Summary of one run, written by `--report`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunReport {
    /// Binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub process_name: String,
    /// Size of the enumerated snapshot.
    pub found: usize,
    /// Pids that could not be sent the custom command.
    #[serde(default)]
    pub input_failures: Vec<u32>,
    #[serde(default)]
    pub processes: Vec<TerminatedProcess>,
    #[serde(default)]
    pub cleanup: Vec<CleanupEntry>,
}

impl RunReport {
    pub fn new(
        process_name: &str,
        termination: TerminationReport,
        cleanup: Vec<CleanupEntry>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            process_name: process_name.to_string(),
            found: termination.found,
            input_failures: termination.input_failures,
            processes: termination.processes,
            cleanup,
        }
    }

    /// Pids whose custom command or kill did not go through.
    pub fn failed_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .processes
            .iter()
            .filter(|p| p.outcome == Termination::Failed)
            .map(|p| p.pid)
            .chain(self.input_failures.iter().copied())
            .collect();
        pids.sort_unstable();
        pids.dedup();
        pids
    }
}

/// Writes `report` as TOML to `path`, creating missing parent directories.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let content = toml::to_string_pretty(report).context("serializing run report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), failed = ?report.failed_pids(), "report written");
    Ok(())
}
