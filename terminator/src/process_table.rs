use std::path::Path;

use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, System};

use crate::error::SignalError;
use crate::signal;
use crate::target::TargetProcess;

/// Result of a cooperative close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    /// The request was delivered; the process may or may not honour it.
    Sent,
    /// The process has nothing that can receive a close request (no window).
    #[cfg_attr(not(windows), allow(dead_code))]
    NoWindow,
    /// The process was already gone.
    AlreadyExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    AlreadyExited,
}

/// The operating system's process list, as seen by the terminator.
///
/// Every operation addresses a single pid and never affects any other process.
pub trait ProcessTable: Send + Sync {
    /// Live processes whose name matches `name`, ordered by pid.
    fn find_by_name(&self, name: &str) -> Vec<TargetProcess>;

    fn is_alive(&self, pid: u32) -> bool;

    fn send_input(&self, pid: u32, text: &str) -> Result<(), SignalError>;

    fn request_close(&self, pid: u32) -> Result<CloseRequest, SignalError>;

    fn kill(&self, pid: u32) -> Result<KillOutcome, SignalError>;
}

/// [`ProcessTable`] backed by a fresh `sysinfo` snapshot on every query.
#[derive(Debug, Default)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTable for SystemProcessTable {
    fn find_by_name(&self, name: &str) -> Vec<TargetProcess> {
        let own_pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let mut found: Vec<TargetProcess> = sys
            .processes()
            .values()
            .filter(|p| p.pid().as_u32() != own_pid)
            .filter(|p| p.thread_kind().is_none() && is_live(p))
            .filter(|p| process_matches(p, name))
            .map(|p| TargetProcess::new(p.pid().as_u32(), p.name().to_string_lossy()))
            .collect();
        found.sort_by_key(|t| t.pid);
        found
    }

    fn is_alive(&self, pid: u32) -> bool {
        let target = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        sys.process(target).is_some_and(is_live)
    }

    fn send_input(&self, pid: u32, text: &str) -> Result<(), SignalError> {
        signal::write_input(pid, text)
    }

    fn request_close(&self, pid: u32) -> Result<CloseRequest, SignalError> {
        if !self.is_alive(pid) {
            return Ok(CloseRequest::AlreadyExited);
        }
        signal::request_close(pid)
    }

    fn kill(&self, pid: u32) -> Result<KillOutcome, SignalError> {
        if !self.is_alive(pid) {
            return Ok(KillOutcome::AlreadyExited);
        }
        signal::kill(pid)
    }
}

/// Zombies and dead entries still show up in the table but cannot be closed.
fn is_live(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn process_matches(process: &Process, target: &str) -> bool {
    names_match(&process.name().to_string_lossy(), target)
        || process
            .exe()
            .and_then(Path::file_name)
            .is_some_and(|file| names_match(&file.to_string_lossy(), target))
}

/// Compares a process name against the requested one, ignoring a trailing
/// `.exe` on either side. Case-insensitive on Windows only.
pub fn names_match(actual: &str, target: &str) -> bool {
    let actual = strip_exe(actual);
    let target = strip_exe(target.trim());
    if target.is_empty() {
        return false;
    }
    if cfg!(windows) {
        actual.eq_ignore_ascii_case(target)
    } else {
        actual == target
    }
}

fn strip_exe(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if !stem.is_empty() && ext.eq_ignore_ascii_case(".exe") => stem,
        _ => name,
    }
}

/// In-memory process table for exercising the terminator without touching
/// real processes. Time-based behaviour follows `tokio::time`, so paused-clock
/// tests see processes exit on schedule.
#[cfg(test)]
pub mod fake {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{names_match, CloseRequest, KillOutcome, ProcessTable};
    use crate::error::SignalError;
    use crate::target::TargetProcess;

    /// What a fake process does when asked to close.
    #[derive(Debug, Clone, Copy)]
    pub enum OnClose {
        Exit,
        ExitAfter(Duration),
        Ignore,
        NoWindow,
    }

    #[derive(Debug, Clone)]
    pub struct FakeProcess {
        pid: u32,
        name: String,
        on_close: OnClose,
        accepts_input: bool,
        killable: bool,
        exits_before_kill: bool,
        exits_at: Option<Instant>,
        killed: bool,
    }

    impl FakeProcess {
        pub fn new(pid: u32, name: &str) -> Self {
            Self {
                pid,
                name: name.to_string(),
                on_close: OnClose::Exit,
                accepts_input: true,
                killable: true,
                exits_before_kill: false,
                exits_at: None,
                killed: false,
            }
        }

        pub fn on_close(mut self, on_close: OnClose) -> Self {
            self.on_close = on_close;
            self
        }

        pub fn rejecting_input(mut self) -> Self {
            self.accepts_input = false;
            self
        }

        pub fn unkillable(mut self) -> Self {
            self.killable = false;
            self
        }

        /// Still alive at the last liveness check, gone by the time the kill lands.
        pub fn exiting_before_kill(mut self) -> Self {
            self.exits_before_kill = true;
            self
        }

        /// Exits by itself `after` from now, whatever else happens.
        pub fn exiting_after(mut self, after: Duration) -> Self {
            self.exits_at = Some(Instant::now() + after);
            self
        }

        fn alive(&self) -> bool {
            !self.killed && self.exits_at.map_or(true, |at| Instant::now() < at)
        }

        fn exit_by(&mut self, at: Instant) {
            self.exits_at = Some(self.exits_at.map_or(at, |current| current.min(at)));
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeProcessTable {
        processes: Mutex<Vec<FakeProcess>>,
        inputs: Mutex<Vec<(u32, String)>>,
        close_requests: Mutex<Vec<u32>>,
        kills: Mutex<Vec<u32>>,
        enumerations: AtomicUsize,
    }

    impl FakeProcessTable {
        pub fn with(processes: Vec<FakeProcess>) -> Self {
            Self {
                processes: Mutex::new(processes),
                ..Self::default()
            }
        }

        pub fn inputs(&self) -> Vec<(u32, String)> {
            self.inputs.lock().unwrap().clone()
        }

        pub fn close_requests(&self) -> Vec<u32> {
            let mut pids = self.close_requests.lock().unwrap().clone();
            pids.sort_unstable();
            pids
        }

        pub fn kills(&self) -> Vec<u32> {
            let mut pids = self.kills.lock().unwrap().clone();
            pids.sort_unstable();
            pids
        }

        pub fn enumerations(&self) -> usize {
            self.enumerations.load(Ordering::SeqCst)
        }

        fn with_process<T>(&self, pid: u32, f: impl FnOnce(&mut FakeProcess) -> T) -> Option<T> {
            let mut processes = self.processes.lock().unwrap();
            processes.iter_mut().find(|p| p.pid == pid).map(f)
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn find_by_name(&self, name: &str) -> Vec<TargetProcess> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            let processes = self.processes.lock().unwrap();
            let mut found: Vec<TargetProcess> = processes
                .iter()
                .filter(|p| p.alive() && names_match(&p.name, name))
                .map(|p| TargetProcess::new(p.pid, p.name.clone()))
                .collect();
            found.sort_by_key(|t| t.pid);
            found
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.with_process(pid, |p| p.alive()).unwrap_or(false)
        }

        fn send_input(&self, pid: u32, text: &str) -> Result<(), SignalError> {
            let accepted = self
                .with_process(pid, |p| p.alive() && p.accepts_input)
                .unwrap_or(false);
            if !accepted {
                return Err(SignalError::Io {
                    pid,
                    source: io::Error::from(io::ErrorKind::BrokenPipe),
                });
            }
            self.inputs.lock().unwrap().push((pid, text.to_string()));
            Ok(())
        }

        fn request_close(&self, pid: u32) -> Result<CloseRequest, SignalError> {
            self.close_requests.lock().unwrap().push(pid);
            let request = self.with_process(pid, |p| {
                if !p.alive() {
                    return CloseRequest::AlreadyExited;
                }
                match p.on_close {
                    OnClose::Exit => {
                        p.exit_by(Instant::now());
                        CloseRequest::Sent
                    }
                    OnClose::ExitAfter(after) => {
                        p.exit_by(Instant::now() + after);
                        CloseRequest::Sent
                    }
                    OnClose::Ignore => CloseRequest::Sent,
                    OnClose::NoWindow => CloseRequest::NoWindow,
                }
            });
            Ok(request.unwrap_or(CloseRequest::AlreadyExited))
        }

        fn kill(&self, pid: u32) -> Result<KillOutcome, SignalError> {
            let outcome = self.with_process(pid, |p| {
                if !p.alive() {
                    return Ok(KillOutcome::AlreadyExited);
                }
                if p.exits_before_kill {
                    p.exit_by(Instant::now());
                    return Ok(KillOutcome::AlreadyExited);
                }
                if !p.killable {
                    return Err(SignalError::PermissionDenied { pid });
                }
                p.killed = true;
                Ok(KillOutcome::Killed)
            });
            let outcome = outcome.unwrap_or(Ok(KillOutcome::AlreadyExited));
            if matches!(outcome, Ok(KillOutcome::Killed)) {
                self.kills.lock().unwrap().push(pid);
            }
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── names_match ───────────────────────────────────────────────────────────

    #[test]
    fn exe_suffix_is_ignored_on_either_side() {
        assert!(names_match("notepad.exe", "notepad"));
        assert!(names_match("notepad", "notepad.exe"));
        assert!(names_match("notepad.EXE", "notepad"));
    }

    #[test]
    fn different_names_do_not_match() {
        assert!(!names_match("notepad++", "notepad"));
        assert!(!names_match("note", "notepad"));
    }

    #[test]
    fn blank_target_matches_nothing() {
        assert!(!names_match("notepad", ""));
        assert!(!names_match(".exe", " "));
    }

    #[test]
    fn bare_exe_name_is_not_stripped() {
        assert_eq!(strip_exe(".exe"), ".exe");
        assert_eq!(strip_exe("a.exe"), "a");
        assert_eq!(strip_exe("ab"), "ab");
    }

    #[cfg(not(windows))]
    #[test]
    fn matching_is_case_sensitive_off_windows() {
        assert!(!names_match("Notepad", "notepad"));
    }

    #[cfg(windows)]
    #[test]
    fn matching_is_case_insensitive_on_windows() {
        assert!(names_match("Notepad.exe", "notepad"));
    }

    // ── SystemProcessTable ────────────────────────────────────────────────────

    #[test]
    fn own_process_is_alive() {
        assert!(SystemProcessTable::new().is_alive(std::process::id()));
    }

    #[test]
    fn unknown_name_finds_nothing() {
        let table = SystemProcessTable::new();
        assert!(table.find_by_name("zz-no-such-process-4f1c9a").is_empty());
    }

    #[test]
    fn closing_a_missing_process_reports_already_exited() {
        let table = SystemProcessTable::new();
        // Linux pid_max never exceeds 2^22; other platforms do not reach this high either.
        let missing = 4_194_304 + 23;
        assert_eq!(table.request_close(missing).unwrap(), CloseRequest::AlreadyExited);
        assert_eq!(table.kill(missing).unwrap(), KillOutcome::AlreadyExited);
    }

    // ── live processes ────────────────────────────────────────────────────────

    #[cfg(unix)]
    mod live {
        use super::*;
        use nix::sys::signal::Signal;
        use std::os::unix::process::ExitStatusExt;
        use std::process::{Child, Command};
        use std::time::Duration;

        fn spawn_sleep() -> Child {
            Command::new("sleep").arg("30").spawn().unwrap()
        }

        fn eventually(mut done: impl FnMut() -> bool) -> bool {
            for _ in 0..50 {
                if done() {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            false
        }

        #[test]
        fn spawned_process_is_enumerated_by_name() {
            let mut child = spawn_sleep();
            let found = SystemProcessTable::new().find_by_name("sleep");
            let _ = child.kill();
            let _ = child.wait();

            assert!(found.iter().any(|t| t.pid == child.id()));
        }

        #[test]
        fn close_request_ends_a_live_process() {
            let table = SystemProcessTable::new();
            let mut child = spawn_sleep();
            let pid = child.id();

            assert_eq!(table.request_close(pid).unwrap(), CloseRequest::Sent);

            // Unreaped, the child lingers as a zombie, which no longer counts.
            assert!(eventually(|| !table.is_alive(pid)));
            assert!(!table.find_by_name("sleep").iter().any(|t| t.pid == pid));
            let status = child.wait().unwrap();
            assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
        }

        #[test]
        fn kill_ends_a_live_process() {
            let table = SystemProcessTable::new();
            let mut child = spawn_sleep();
            let pid = child.id();

            assert_eq!(table.kill(pid).unwrap(), KillOutcome::Killed);

            let status = child.wait().unwrap();
            assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
            assert!(!table.is_alive(pid));
        }
    }
}
