//! Terminal Session Model
//!
//! The registry's record of one logical terminal tab. The record is a plain
//! value: the process handle lives in the supervisor and buffered output in
//! the bridge, so snapshots can be cloned freely and handed to the UI host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::ProcessExit;

/// Opaque, never-reused identifier of a terminal session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Lifecycle state of a session
///
/// `Connecting -> Running -> Exited | Failed`, with `Failed` also reachable
/// straight from `Connecting` when the spawn fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Record stored, spawn in progress
    #[default]
    Connecting,
    /// Process is alive
    Running,
    /// Process terminated on its own or was killed
    Exited,
    /// Spawn failed
    Failed,
}

impl SessionStatus {
    /// `Exited` and `Failed` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Exited | SessionStatus::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Connecting, SessionStatus::Running)
                | (SessionStatus::Connecting, SessionStatus::Failed)
                | (SessionStatus::Running, SessionStatus::Exited)
                | (SessionStatus::Running, SessionStatus::Failed)
        )
    }
}

/// Snapshot of a terminal session as seen by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSession {
    /// Session identifier
    pub id: SessionId,

    /// Profile the shell was launched from
    pub profile_name: String,

    /// Theme used to render the session
    pub theme_name: String,

    /// Working directory the shell was started in
    pub cwd: PathBuf,

    /// Tab title
    pub title: String,

    /// Current pty dimensions
    pub size: TerminalSize,

    /// Lifecycle state
    pub status: SessionStatus,

    /// When the session was requested
    pub created_at: DateTime<Utc>,

    /// Last time the session received input or focus
    pub last_active_at: DateTime<Utc>,

    /// Whether this is the registry's active session
    pub is_active: bool,

    /// OS process id, once spawned
    pub pid: Option<u32>,

    /// How the process ended, once it has
    pub exit: Option<ProcessExit>,
}

impl TerminalSession {
    /// Create a record in the `Connecting` state
    pub fn new(
        id: SessionId,
        profile_name: String,
        theme_name: String,
        cwd: PathBuf,
        size: TerminalSize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: profile_name.clone(),
            profile_name,
            theme_name,
            cwd,
            size,
            status: SessionStatus::Connecting,
            created_at: now,
            last_active_at: now,
            is_active: false,
            pid: None,
            exit: None,
        }
    }

    /// Apply a status transition.
    ///
    /// Returns `false` and leaves the record untouched when the transition is
    /// not legal from the current state (e.g. a duplicate exit event).
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Check if the process is running
    pub fn is_running(&self) -> bool {
        matches!(self.status, SessionStatus::Running)
    }

    /// Record activity
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Age of the session
    pub fn session_duration(&self) -> std::time::Duration {
        Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }
}
