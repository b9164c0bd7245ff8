//! Platform-specific operation traits
//!
//! What spawn resolution needs to know about the host OS.

use std::path::{Path, PathBuf};

/// Platform-specific filesystem operations
pub trait FilesystemOps: Send + Sync {
    /// Check if a file is executable
    fn is_executable(&self, path: &Path) -> bool;

    /// Find a command in PATH. Paths containing a separator are checked
    /// as-is instead of being searched for.
    fn find_command(&self, command: &str) -> Option<PathBuf>;
}

/// Platform-specific shell operations
pub trait ShellOps: Send + Sync {
    /// Get default shell path
    fn default_shell(&self) -> PathBuf;

    /// Variables advertising the terminal's capabilities to the shell
    fn terminal_env(&self) -> Vec<(&'static str, &'static str)>;
}
