use std::time::Duration;
use tokio::time::sleep;

use crate::process_table::ProcessTable;
use crate::progress::Reporter;

/// Blocks until no live process named `monitor` remains.
///
/// Polls the process table every `interval`. Returns immediately, without
/// sleeping, when `monitor` is `None` or nothing matches at the first check.
/// There is no deadline. Returns whether any waiting happened.
pub async fn wait_until_gone(
    table: &dyn ProcessTable,
    monitor: Option<&str>,
    interval: Duration,
    reporter: &Reporter,
) -> bool {
    let Some(monitor) = monitor else {
        return false;
    };

    if table.find_by_name(monitor).is_empty() {
        return false;
    }

    reporter.line(format!("Waiting {monitor} to exit."));
    let mut polls = 0u64;
    loop {
        sleep(interval).await;
        polls += 1;
        let remaining = table.find_by_name(monitor);
        if remaining.iter().all(|p| !table.is_alive(p.pid)) {
            break;
        }
        tracing::debug!(monitor, polls, remaining = remaining.len(), "still waiting");
    }
    tracing::debug!(monitor, polls, "monitored process exited");
    true
}
