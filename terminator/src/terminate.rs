/// The close sequence applied to an enumerated snapshot of target processes:
/// delay, custom command, cooperative close, escalation to a kill.
///
/// Stages run one after another. Within the command and close stages every
/// process gets its own task, and the stage only ends once all of them have
/// finished. A failure on one process is logged and recorded, never
/// propagated to its siblings; only a panicking task fails the stage.
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};

use crate::config::RunConfig;
use crate::process_table::{CloseRequest, KillOutcome, ProcessTable};
use crate::progress::Reporter;
use crate::target::{TargetProcess, TerminatedProcess, Termination};

/// How often a closing process is checked during its grace period.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct TerminationReport {
    pub found: usize,
    /// Pids whose standard input could not take the custom command.
    pub input_failures: Vec<u32>,
    /// One entry per target, ordered by pid.
    pub processes: Vec<TerminatedProcess>,
}

impl TerminationReport {
    pub fn killed(&self) -> Vec<u32> {
        self.processes
            .iter()
            .filter(|p| p.outcome == Termination::Killed)
            .map(|p| p.pid)
            .collect()
    }
}

/// Runs the close sequence over `targets`. An empty snapshot is a no-op.
pub async fn terminate(
    config: &RunConfig,
    targets: Vec<TargetProcess>,
    table: Arc<dyn ProcessTable>,
    reporter: Arc<Reporter>,
) -> Result<TerminationReport> {
    let found = targets.len();
    if targets.is_empty() {
        return Ok(TerminationReport::default());
    }

    let label = config.process_name.as_str();

    if !config.delay().is_zero() {
        reporter.line(format!(
            "Delaying termination for {} seconds.",
            config.delay_secs
        ));
        sleep(config.delay()).await;
    }

    let input_failures = match config.command.as_deref() {
        Some(command) => {
            send_close_command(command, config.wait(), &targets, &table, &reporter).await?
        }
        None => Vec::new(),
    };

    let processes = close_all(label, config.wait(), targets, &table, &reporter).await?;

    let report = TerminationReport {
        found,
        input_failures,
        processes,
    };
    let killed = report.killed();
    if killed.is_empty() {
        reporter.line(format!(
            "Finished with {found} {label} instance(s), none forcibly killed."
        ));
    } else {
        let pids: Vec<String> = killed.iter().map(u32::to_string).collect();
        reporter.line(format!(
            "Finished with {found} {label} instance(s), forcibly killed: {}.",
            pids.join(", ")
        ));
    }
    Ok(report)
}

/// Writes `command` to every target's standard input, then gives them `wait`
/// to act on it. Returns the pids the write failed for.
async fn send_close_command(
    command: &str,
    wait: Duration,
    targets: &[TargetProcess],
    table: &Arc<dyn ProcessTable>,
    reporter: &Reporter,
) -> Result<Vec<u32>> {
    reporter.line(format!("Sending '{command}' to all instances running."));

    let mut tasks = JoinSet::new();
    for target in targets {
        let table = Arc::clone(table);
        let pid = target.pid;
        let command = command.to_string();
        // Writing to a full pipe blocks.
        tasks.spawn_blocking(move || match table.send_input(pid, &command) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(pid, "failed to send command: {e}");
                Some(pid)
            }
        });
    }

    let mut failures = Vec::new();
    let mut panicked = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(pid)) => failures.push(pid),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("command task failed: {e}");
                panicked += 1;
            }
        }
    }
    if panicked > 0 {
        bail!("{panicked} command task(s) did not complete");
    }
    failures.sort_unstable();

    if !wait.is_zero() {
        reporter.line(format!("Waiting for {} seconds.", wait.as_secs()));
        sleep(wait).await;
    }
    Ok(failures)
}

async fn close_all(
    label: &str,
    wait: Duration,
    targets: Vec<TargetProcess>,
    table: &Arc<dyn ProcessTable>,
    reporter: &Arc<Reporter>,
) -> Result<Vec<TerminatedProcess>> {
    reporter.line(format!("Requesting all {label} instances to close."));

    let mut tasks = JoinSet::new();
    for target in targets {
        tasks.spawn(close_one(
            target,
            label.to_string(),
            wait,
            Arc::clone(table),
            Arc::clone(reporter),
        ));
    }

    let mut closed = Vec::with_capacity(tasks.len());
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(process)) => closed.push(process),
            Ok(Err(e)) => {
                tracing::error!("close task failed: {e:#}");
                failed += 1;
            }
            Err(e) => {
                tracing::error!("close task failed: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} close task(s) did not complete");
    }
    closed.sort_by_key(|p| p.pid);
    Ok(closed)
}

/// Close request, grace period, kill if needed, release.
async fn close_one(
    mut target: TargetProcess,
    label: String,
    wait: Duration,
    table: Arc<dyn ProcessTable>,
    reporter: Arc<Reporter>,
) -> Result<TerminatedProcess> {
    let pid = target.pid;
    let exited = match on_blocking_pool(&table, move |t| t.request_close(pid)).await? {
        Ok(CloseRequest::Sent) => wait_for_exit(&table, pid, wait).await?,
        Ok(CloseRequest::AlreadyExited) => true,
        Ok(CloseRequest::NoWindow) => {
            tracing::debug!(pid, "nothing to receive a close request");
            false
        }
        Err(e) => {
            tracing::warn!(pid, "close request failed: {e}");
            false
        }
    };

    let mut error = None;
    if exited {
        target.mark_exited();
    } else {
        match on_blocking_pool(&table, move |t| t.kill(pid)).await? {
            Ok(KillOutcome::Killed) => {
                reporter.line(format!("Terminating {label} ({pid})"));
                target.mark_killed();
            }
            Ok(KillOutcome::AlreadyExited) => {
                tracing::debug!(pid, "exited before the kill landed");
                target.mark_exited();
            }
            Err(e) => {
                tracing::warn!(pid, "kill failed: {e}");
                reporter.line(format!("Failed to terminate {label} ({pid}): {e}"));
                error = Some(e.to_string());
            }
        }
    }

    tracing::debug!(pid, state = ?target.state(), "releasing");
    Ok(target.release(error))
}

/// Polls until `pid` is gone or `timeout` elapses. A zero timeout checks once.
async fn wait_for_exit(table: &Arc<dyn ProcessTable>, pid: u32, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if !on_blocking_pool(table, move |t| t.is_alive(pid)).await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        sleep(EXIT_POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Runs one process-table call off the async workers. Every call takes a
/// fresh OS snapshot or makes a system call.
async fn on_blocking_pool<T, F>(table: &Arc<dyn ProcessTable>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ProcessTable) -> T + Send + 'static,
{
    let table = Arc::clone(table);
    Ok(tokio::task::spawn_blocking(move || op(table.as_ref())).await?)
}
