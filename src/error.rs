//! Error types and Result aliases for tabmux

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::models::SessionId;

/// Result type alias for tabmux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tabmux
#[derive(Debug, ThisError)]
pub enum Error {
    // === Spawn-time errors (returned synchronously from session creation) ===
    /// Profile was never registered
    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    /// Theme was never registered
    #[error("Theme '{name}' not found")]
    ThemeNotFound { name: String },

    /// Shell executable could not be located
    #[error("Shell '{shell}' not found")]
    ShellNotFound { shell: String },

    /// Shell executable exists but cannot be executed
    #[error("Permission denied executing '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    /// The pty or the child process could not be created
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    // === Session errors ===
    /// Operation against an unknown or already removed session
    #[error("Session '{id}' not found")]
    SessionNotFound { id: SessionId },

    /// Write issued after the process exited
    #[error("Process for session '{id}' already terminated")]
    ProcessAlreadyTerminated { id: SessionId },

    /// Stdin pipe of the process is broken
    #[error("Failed to write to session '{id}': {reason}")]
    WriteFailure { id: SessionId, reason: String },

    /// Host did not reconnect within the grace window
    #[error("Host '{host_id}' did not reconnect within {grace:?}")]
    HostDisconnectTimeout { host_id: String, grace: Duration },

    // === Split view errors ===
    /// Split view not found
    #[error("Split view '{split_id}' not found")]
    SplitNotFound { split_id: String },

    /// Invalid split layout request
    #[error("Invalid split: {reason}")]
    InvalidSplit { reason: String },

    // === Catalog errors ===
    /// Color value could not be parsed
    #[error("Invalid color '{value}': expected #rrggbb")]
    InvalidColor { value: String },

    // === Configuration errors ===
    /// Failed to load configuration file
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// Failed to parse configuration
    #[error("Failed to parse {format} config: {reason}")]
    ConfigParseFailed { format: String, reason: String },

    /// Configuration validation failed
    #[error("Configuration validation failed for '{field}': {reason}")]
    ConfigValidationFailed { field: String, reason: String },

    // === Host protocol errors ===
    /// Malformed or out-of-sequence host message
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    // === I/O and serialization errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regex compilation errors
    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Errors that can only happen while creating a session
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            Error::ProfileNotFound { .. }
                | Error::ThemeNotFound { .. }
                | Error::ShellNotFound { .. }
                | Error::PermissionDenied { .. }
                | Error::SpawnFailed { .. }
        )
    }

    /// Errors the data path logs and drops instead of surfacing
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Error::ProcessAlreadyTerminated { .. } | Error::SessionNotFound { .. }
        )
    }
}
