mod cleanup;
mod config;
mod error;
mod pipeline;
mod process_monitor;
mod process_table;
mod progress;
mod report;
mod signal;
mod target;
mod terminate;

use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Cli;
use crate::process_table::{ProcessTable, SystemProcessTable};
use crate::progress::Reporter;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // No target: show usage and leave every process alone.
    let Some(run_config) = cli.run_config() else {
        if let Err(e) = Cli::command().print_long_help() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    };

    let report_path = run_config.report.clone();
    let reporter = Arc::new(Reporter::stdout(
        run_config.log.then(progress::log_file_path),
    ));
    let table: Arc<dyn ProcessTable> = Arc::new(SystemProcessTable::new());
    let pipeline = pipeline::Pipeline::new(run_config, table, Arc::clone(&reporter));

    match pipeline.run().await {
        Ok(Some(report)) => {
            if let Some(path) = report_path {
                // The run itself is done; only the summary is missing.
                if let Err(e) = report::write_report(&path, &report) {
                    reporter.log_only(format!("Error: {e:#}"));
                    eprintln!("Error: {e:#}");
                    std::process::exit(1);
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            // Whatever stages finished stay finished; there is no rollback.
            reporter.log_only(format!("Error: {e:?}"));
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

/// Diagnostics go to stderr so stdout carries only progress lines.
/// Verbosity follows `RUST_LOG`, defaulting to warnings.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
