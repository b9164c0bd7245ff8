//! Pseudoterminal (PTY) Management
//!
//! Process spawning, I/O streams and forced termination for the shells
//! behind each session. [`ProcessSupervisor`] owns the handles; the
//! [`ProcessSpawner`] implementations decide what a process actually is.

pub mod fake;
pub mod native;
pub mod process;
pub mod signals;
pub mod streams;
pub mod supervisor;

// Re-exports for convenience
pub use fake::{FakeProcess, FakeSpawner};
pub use native::{NativeProcess, PtySpawner};
pub use process::{ProcessIo, ProcessSpawner, ShellProcess, SpawnRequest, SpawnedProcess};
pub use supervisor::{ProcessStart, ProcessSupervisor};
