use std::io;
use thiserror::Error;

/// Rejected run options. Raised before any process is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a process name is required")]
    MissingProcessName,
}

/// Failure to deliver a close request, a kill or a line of input to one process.
///
/// Always scoped to a single pid; callers log it and carry on with the
/// remaining processes.
#[derive(Debug, Error)]
pub enum SignalError {
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    #[error("pid {pid}: standard input is not a pipe or terminal")]
    NotAStream { pid: u32 },

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    #[error("pid {pid}: standard input is full")]
    InputFull { pid: u32 },

    #[error("permission denied for pid {pid}")]
    PermissionDenied { pid: u32 },

    #[error("pid {pid}: {source}")]
    Io {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("pid {pid}: {message}")]
    Os { pid: u32, message: String },
}
