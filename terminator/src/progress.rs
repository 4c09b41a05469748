/// Human-readable progress output.
///
/// Every line goes to stdout. With `--log` each line is also appended, with a
/// local timestamp, to `process-terminator.log` in the working directory.
/// Workers report concurrently, so file appends are serialized by a mutex.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const LOG_FILE_NAME: &str = "process-terminator.log";

/// Log file location for `--log`: relative to the working directory.
pub fn log_file_path() -> PathBuf {
    PathBuf::from(LOG_FILE_NAME)
}

enum Sink {
    Stdout,
    #[cfg(test)]
    Memory(Vec<String>),
}

pub struct Reporter {
    log_file: Option<PathBuf>,
    sink: Mutex<Sink>,
}

impl Reporter {
    pub fn stdout(log_file: Option<PathBuf>) -> Self {
        Self {
            log_file,
            sink: Mutex::new(Sink::Stdout),
        }
    }

    /// Keeps lines in memory instead of printing them.
    #[cfg(test)]
    pub fn capturing() -> Self {
        Self {
            log_file: None,
            sink: Mutex::new(Sink::Memory(Vec::new())),
        }
    }

    /// Emits one progress line.
    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *sink {
            Sink::Stdout => println!("{message}"),
            #[cfg(test)]
            Sink::Memory(lines) => lines.push(message.to_string()),
        }
        self.append_to_log(message);
    }

    /// Writes to the log file only. No-op without `--log`.
    pub fn log_only(&self, message: impl AsRef<str>) {
        let _sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        self.append_to_log(message.as_ref());
    }

    #[cfg(test)]
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock().unwrap() {
            Sink::Memory(lines) => lines.clone(),
            Sink::Stdout => Vec::new(),
        }
    }

    /// Callers hold the sink lock.
    fn append_to_log(&self, message: &str) {
        let Some(path) = &self.log_file else { return };
        if let Err(e) = append_line(path, message) {
            tracing::warn!("failed to append to log file {}: {e}", path.display());
        }
    }
}

fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let timestamp = chrono::Local::now().format("%Y.%m.%d-%H:%M:%S");
    writeln!(file, "{timestamp} {message}")
}
