/// One full run: monitor wait, enumeration, close sequence, cleanup.
///
/// Stages are strictly sequential. An empty snapshot skips the close
/// sequence but cleanup still runs.
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cleanup;
use crate::config::RunConfig;
use crate::process_monitor;
use crate::process_table::ProcessTable;
use crate::progress::Reporter;
use crate::report::RunReport;
use crate::terminate;

pub struct Pipeline {
    config: RunConfig,
    table: Arc<dyn ProcessTable>,
    reporter: Arc<Reporter>,
    /// Set by the first caller of [`Pipeline::run`].
    started: AtomicBool,
}

impl Pipeline {
    pub fn new(config: RunConfig, table: Arc<dyn ProcessTable>, reporter: Arc<Reporter>) -> Self {
        Self {
            config,
            table,
            reporter,
            started: AtomicBool::new(false),
        }
    }

    /// Runs the pipeline once. Any later or concurrent call returns `Ok(None)`
    /// without doing anything.
    pub async fn run(&self) -> Result<Option<RunReport>> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("run already started");
            return Ok(None);
        }

        let config = &self.config;
        config.validate()?;
        self.reporter.log_only(config.to_args().join(" "));

        process_monitor::wait_until_gone(
            self.table.as_ref(),
            config.monitor.as_deref(),
            config.interval(),
            &self.reporter,
        )
        .await;

        let targets = self.table.find_by_name(&config.process_name);
        if targets.is_empty() {
            self.reporter.line(format!(
                "No {} instances found to terminate.",
                config.process_name
            ));
        } else {
            tracing::debug!(
                name = config.process_name.as_str(),
                found = targets.len(),
                "enumerated targets"
            );
        }

        let termination = terminate::terminate(
            config,
            targets,
            Arc::clone(&self.table),
            Arc::clone(&self.reporter),
        )
        .await?;

        let cleanup = cleanup::remove_leftovers(&config.remove, &self.reporter);

        Ok(Some(RunReport::new(&config.process_name, termination, cleanup)))
    }
}
