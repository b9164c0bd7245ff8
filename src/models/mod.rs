//! Core data models for tabmux
//!
//! Plain data shared between the supervisor, the registry and the host
//! protocol: session records, process bookkeeping and shell families.

pub mod pty_process;
pub mod shell_type;
pub mod terminal_session;

// Re-exports for convenience
pub use pty_process::{ProcessExit, PtyProcess, PtyState};
pub use shell_type::ShellType;
pub use terminal_session::{SessionId, SessionStatus, TerminalSession, TerminalSize};
