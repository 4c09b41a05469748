use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_DELAY_SECS: u64 = 0;
pub const DEFAULT_WAIT_SECS: u64 = 0;

const EXAMPLES: &str = "\
Examples:
    process-terminator whatsapp
        Attempt to exit 'whatsapp' immediately.

    process-terminator -m chrome firefox
        Wait for 'chrome' to exit before attempting to exit 'firefox'.

    process-terminator -d 10 spotify
        Delay for 10 seconds before attempting to exit 'spotify'.

    process-terminator -c \"quit\" -w 5 -r \"/tmp/exif1,/tmp/exif2\" exif
        Send 'quit' to 'exif', give it 5 seconds to exit on its own,
        then delete both leftover paths.

All time-related options are specified in seconds.";

/// Command-line surface. Parsed once in `main` and turned into a [`RunConfig`].
#[derive(Debug, Parser)]
#[command(
    name = "process-terminator",
    about = "Terminate processes by name, with optional graceful-shutdown handling",
    long_about = "Terminate processes by name, with optional graceful-shutdown handling.\n\n\
                  Waits for another process to exit first, delays before acting, sends a \
                  custom command over standard input, gives targets time to close on their \
                  own, kills whatever is left and removes leftover files and directories.",
    after_help = EXAMPLES,
    disable_version_flag = true
)]
pub struct Cli {
    /// Display the program version and exit
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Process to wait for before proceeding
    #[arg(short, long, value_name = "NAME")]
    pub monitor: Option<String>,

    /// How often the monitored process is checked
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Time to wait before sending the close request
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_DELAY_SECS)]
    pub delay: u64,

    /// Custom command written to the target's standard input before closing it
    #[arg(short, long, value_name = "TEXT")]
    pub command: Option<String>,

    /// Time the target is given to close on its own before it is killed
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_WAIT_SECS)]
    pub wait: u64,

    /// Paths (comma-separated) to remove after termination
    #[arg(short, long, value_name = "PATHS", value_delimiter = ',')]
    pub remove: Vec<String>,

    /// Mirror progress to a log file, useful when running without a window
    #[arg(short, long)]
    pub log: bool,

    /// Write a TOML summary of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Name of the process to terminate
    pub process_name: Option<String>,
}

impl Cli {
    /// Returns the run options, or `None` when no process name was given and
    /// the caller should show help instead.
    pub fn run_config(self) -> Option<RunConfig> {
        let process_name = non_blank(self.process_name)?;
        Some(RunConfig {
            monitor: non_blank(self.monitor),
            interval_secs: self.interval,
            delay_secs: self.delay,
            wait_secs: self.wait,
            command: non_blank(self.command),
            remove: self
                .remove
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .collect(),
            log: self.log,
            report: self.report,
            ..RunConfig::new(process_name)
        })
    }
}

/// Validated options for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub process_name: String,
    pub monitor: Option<String>,
    pub interval_secs: u64,
    pub delay_secs: u64,
    pub wait_secs: u64,
    pub command: Option<String>,
    pub remove: Vec<PathBuf>,
    pub log: bool,
    pub report: Option<PathBuf>,
}

impl RunConfig {
    /// Options targeting `process_name` with every other setting at its default.
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            monitor: None,
            interval_secs: DEFAULT_INTERVAL_SECS,
            delay_secs: DEFAULT_DELAY_SECS,
            wait_secs: DEFAULT_WAIT_SECS,
            command: None,
            remove: Vec::new(),
            log: false,
            report: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_name.trim().is_empty() {
            return Err(ConfigError::MissingProcessName);
        }
        Ok(())
    }

    /// Renders the options back into an argument list that parses to the same config.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(command) = &self.command {
            args.extend(["--command".to_string(), command.clone()]);
        }
        if let Some(monitor) = &self.monitor {
            args.extend(["--monitor".to_string(), monitor.clone()]);
        }
        if !self.remove.is_empty() {
            let joined = self
                .remove
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(",");
            args.extend(["--remove".to_string(), joined]);
        }

        args.extend([
            "--interval".to_string(),
            self.interval_secs.to_string(),
            "--wait".to_string(),
            self.wait_secs.to_string(),
            "--delay".to_string(),
            self.delay_secs.to_string(),
        ]);

        if self.log {
            args.push("--log".to_string());
        }
        if let Some(report) = &self.report {
            args.extend(["--report".to_string(), report.to_string_lossy().into_owned()]);
        }

        args.push(self.process_name.clone());
        args
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
