use serde::{Deserialize, Serialize};

/// Where a target process stands in the close sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Alive as far as we know: enumerated, possibly asked to close.
    Running,
    /// Exited on its own, before or after the close request.
    ExitedGracefully,
    /// Forcibly terminated after the grace period.
    Killed,
}

/// One OS process captured by enumeration.
///
/// Owned by exactly one worker during the close stage and consumed by
/// [`TargetProcess::release`], so no handle outlives the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProcess {
    pub pid: u32,
    pub name: String,
    state: ProcessState,
}

impl TargetProcess {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            state: ProcessState::Running,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn mark_exited(&mut self) {
        self.state = ProcessState::ExitedGracefully;
    }

    pub fn mark_killed(&mut self) {
        self.state = ProcessState::Killed;
    }

    /// Closes the handle. A process still `Running` here is one that survived
    /// the kill attempt; `error` says why.
    pub fn release(self, error: Option<String>) -> TerminatedProcess {
        let outcome = match self.state {
            ProcessState::ExitedGracefully => Termination::Graceful,
            ProcessState::Killed => Termination::Killed,
            ProcessState::Running => Termination::Failed,
        };
        TerminatedProcess {
            pid: self.pid,
            name: self.name,
            outcome,
            error,
        }
    }
}

/// How a target left the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    Graceful,
    Killed,
    Failed,
}

/// A released (closed) target and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminatedProcess {
    pub pid: u32,
    pub name: String,
    pub outcome: Termination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
