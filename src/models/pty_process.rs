//! PTY Process Model
//!
//! Bookkeeping the supervisor keeps next to every process handle: what was
//! launched, where, when, and how it ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a process terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProcessExit {
    /// Exit code (0 when the process was killed by a signal)
    pub code: u32,
    /// Name of the terminating signal, if any
    pub signal: Option<String>,
}

impl ProcessExit {
    pub fn with_code(code: u32) -> Self {
        Self { code, signal: None }
    }

    pub fn with_signal(signal: impl Into<String>) -> Self {
        Self {
            code: 0,
            signal: Some(signal.into()),
        }
    }

    /// Check if the process exited successfully (exit code 0, no signal)
    pub fn success(&self) -> bool {
        self.code == 0 && self.signal.is_none()
    }
}

/// Represents the state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PtyState {
    /// Process is currently running
    #[default]
    Running,
    /// Process has terminated
    Terminated,
}

/// Launch details and lifecycle of one supervised process
#[derive(Debug, Clone)]
pub struct PtyProcess {
    /// OS process identifier
    pub pid: Option<u32>,

    /// Current state of the process
    pub state: PtyState,

    /// When the process was started
    pub start_time: DateTime<Utc>,

    /// When the process terminated (if applicable)
    pub end_time: Option<DateTime<Utc>>,

    /// How the process ended (if it has)
    pub exit: Option<ProcessExit>,

    /// Executable that was launched
    pub command: String,

    /// Arguments passed to the command
    pub args: Vec<String>,

    /// Working directory of the process
    pub working_directory: PathBuf,
}

impl PtyProcess {
    /// Record a freshly started process
    pub fn started(
        command: String,
        args: Vec<String>,
        working_directory: PathBuf,
        pid: Option<u32>,
    ) -> Self {
        Self {
            pid,
            state: PtyState::Running,
            start_time: Utc::now(),
            end_time: None,
            exit: None,
            command,
            args,
            working_directory,
        }
    }

    /// Mark the process as terminated. Only the first call has an effect.
    pub fn mark_terminated(&mut self, exit: ProcessExit) -> bool {
        if self.is_terminated() {
            return false;
        }
        self.state = PtyState::Terminated;
        self.end_time = Some(Utc::now());
        self.exit = Some(exit);
        true
    }

    /// Check if the process is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.state, PtyState::Running)
    }

    /// Check if the process has terminated
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, PtyState::Terminated)
    }

    /// Get the execution duration if the process has terminated
    pub fn execution_duration(&self) -> Option<std::time::Duration> {
        self.end_time
            .map(|end| end.signed_duration_since(self.start_time).to_std().unwrap_or_default())
    }
}

impl std::fmt::Display for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pid = self.pid.map_or("N/A".to_string(), |pid| pid.to_string());
        let state = match self.state {
            PtyState::Running => "Running",
            PtyState::Terminated => "Terminated",
        };
        write!(f, "{} [{}] - {} {}", self.command, pid, state, self.args.join(" "))?;
        if let Some(exit) = &self.exit {
            match &exit.signal {
                Some(signal) => write!(f, " (signal: {})", signal)?,
                None => write!(f, " (exit: {})", exit.code)?,
            }
        }
        Ok(())
    }
}
