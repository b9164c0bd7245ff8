//! Unix-specific platform implementations

mod filesystem;
mod shell;

pub use filesystem::UnixFilesystem;
pub use shell::UnixShell;
