/// Platform-specific delivery of close requests, kills and standard-input lines.
///
/// - Unix: the cooperative close is `SIGTERM`, escalation is `SIGKILL`.
/// - Windows: the cooperative close posts `WM_CLOSE` to every visible top-level
///   window owned by the process; a process without one cannot be asked to
///   close and is escalated. Escalation is `TerminateProcess` via `sysinfo`.
///
/// Writing to another process's standard input is only possible on Linux,
/// through `/proc/<pid>/fd/0`, and only when it is a pipe, socket or terminal.
/// The write never blocks: a full pipe is reported as an error.
use crate::error::SignalError;
use crate::process_table::{CloseRequest, KillOutcome};

// ── Unix implementation ────────────────────────────────────────────────────────

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    use crate::error::SignalError;

    /// Returns `Ok(false)` when the process no longer exists.
    fn send(pid: u32, sig: Signal) -> Result<bool, SignalError> {
        // pid 0 and negative pids address process groups.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => {
                return Err(SignalError::Os {
                    pid,
                    message: "not a signalable process id".to_string(),
                })
            }
        };
        match signal::kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(Errno::EPERM) => Err(SignalError::PermissionDenied { pid }),
            Err(errno) => Err(SignalError::Os {
                pid,
                message: errno.desc().to_string(),
            }),
        }
    }

    pub fn terminate(pid: u32) -> Result<bool, SignalError> {
        send(pid, Signal::SIGTERM)
    }

    pub fn kill(pid: u32) -> Result<bool, SignalError> {
        send(pid, Signal::SIGKILL)
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use sysinfo::{Pid, ProcessesToUpdate, System};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, IsWindowVisible, PostMessageW, WM_CLOSE,
    };

    use crate::error::SignalError;

    struct WindowSearch {
        pid: u32,
        found: Vec<HWND>,
    }

    unsafe extern "system" fn collect_windows(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut WindowSearch);
        let mut owner = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut owner as *mut u32));
        if owner == search.pid && IsWindowVisible(hwnd).as_bool() {
            search.found.push(hwnd);
        }
        BOOL(1)
    }

    /// Returns `Ok(false)` when the process owns no visible top-level window.
    pub fn terminate(pid: u32) -> Result<bool, SignalError> {
        let mut search = WindowSearch {
            pid,
            found: Vec::new(),
        };
        unsafe {
            EnumWindows(
                Some(collect_windows),
                LPARAM(&mut search as *mut WindowSearch as isize),
            )
        }
        .map_err(|e| SignalError::Os {
            pid,
            message: e.to_string(),
        })?;

        if search.found.is_empty() {
            return Ok(false);
        }
        for hwnd in search.found {
            unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)) }.map_err(|e| {
                SignalError::Os {
                    pid,
                    message: e.to_string(),
                }
            })?;
        }
        Ok(true)
    }

    /// Returns `Ok(false)` when the process no longer exists.
    pub fn kill(pid: u32) -> Result<bool, SignalError> {
        let target = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        match sys.process(target) {
            None => Ok(false),
            Some(process) if process.kill() => Ok(true),
            Some(_) => Err(SignalError::Os {
                pid,
                message: "TerminateProcess failed".to_string(),
            }),
        }
    }
}

// ── Public API ─────────────────────────────────────────────────────────────────

/// Asks `pid` to close on its own.
pub fn request_close(pid: u32) -> Result<CloseRequest, SignalError> {
    #[cfg(unix)]
    {
        Ok(if imp::terminate(pid)? {
            CloseRequest::Sent
        } else {
            CloseRequest::AlreadyExited
        })
    }
    #[cfg(windows)]
    {
        Ok(if imp::terminate(pid)? {
            CloseRequest::Sent
        } else {
            CloseRequest::NoWindow
        })
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(SignalError::Unsupported { operation: "requesting a close" })
    }
}

/// Forcibly terminates `pid`.
pub fn kill(pid: u32) -> Result<KillOutcome, SignalError> {
    #[cfg(any(unix, windows))]
    {
        Ok(if imp::kill(pid)? {
            KillOutcome::Killed
        } else {
            KillOutcome::AlreadyExited
        })
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(SignalError::Unsupported { operation: "killing a process" })
    }
}

/// Writes `text` plus a newline to the standard input of `pid` and flushes it.
pub fn write_input(pid: u32, text: &str) -> Result<(), SignalError> {
    #[cfg(target_os = "linux")]
    {
        use nix::fcntl::OFlag;
        use std::io::{ErrorKind, Write};
        use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};

        let io_err = |source: std::io::Error| SignalError::Io { pid, source };
        // A full pipe must fail the write, never stall it.
        let mut stdin = std::fs::OpenOptions::new()
            .write(true)
            .custom_flags((OFlag::O_NONBLOCK | OFlag::O_NOCTTY).bits())
            .open(format!("/proc/{pid}/fd/0"))
            .map_err(io_err)?;

        // Redirected from a file: writing would overwrite its contents.
        let kind = stdin.metadata().map_err(io_err)?.file_type();
        if !(kind.is_fifo() || kind.is_socket() || kind.is_char_device()) {
            return Err(SignalError::NotAStream { pid });
        }

        match stdin.write_all(format!("{text}\n").as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(SignalError::InputFull { pid }),
            Err(e) => Err(io_err(e)),
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (pid, text);
        Err(SignalError::Unsupported { operation: "writing to standard input" })
    }
}
