//! Process abstraction and spawn request resolution
//!
//! A [`ShellProcess`] is one running shell behind a pseudoterminal. It is
//! produced by a [`ProcessSpawner`] together with the receivers carrying its
//! output, exit status and asynchronous write failures. The helpers in this
//! module turn a profile into a concrete [`SpawnRequest`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::catalog::TerminalProfile;
use crate::error::{Error, Result};
use crate::models::{ProcessExit, ShellType, TerminalSize};
use crate::platform::Platform;

/// Handle to a running shell process
pub trait ShellProcess: Send + Sync + std::fmt::Debug {
    /// OS process id, when the platform reports one
    fn pid(&self) -> Option<u32>;

    /// Queue bytes for the process stdin. Delivery is asynchronous: a
    /// broken pipe discovered later is reported on [`ProcessIo::failures`].
    fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Resize the pseudoterminal
    fn resize(&self, size: TerminalSize) -> io::Result<()>;

    /// Forcefully terminate the process
    fn kill(&self) -> io::Result<()>;

    /// Whether the process has terminated
    fn has_exited(&self) -> bool;
}

/// Receivers owned by whoever pumps the process output
#[derive(Debug)]
pub struct ProcessIo {
    /// Output bytes in the order the process produced them
    pub stdout: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Error stream. A pty merges stderr into stdout, so native processes
    /// close this immediately.
    pub stderr: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Resolves exactly once when the process terminates
    pub exit: oneshot::Receiver<ProcessExit>,
    /// Stdin write failures, one message per failed write
    pub failures: mpsc::UnboundedReceiver<String>,
}

/// A freshly spawned process and its I/O
#[derive(Debug)]
pub struct SpawnedProcess {
    pub process: Arc<dyn ShellProcess>,
    pub io: ProcessIo,
}

/// Fully resolved launch parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Absolute or PATH-resolvable executable
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Complete environment of the child
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub size: TerminalSize,
}

/// Creates shell processes
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnedProcess>;
}

/// Pick the shell: explicit override, then profile, then platform default
pub fn resolve_shell(profile: &TerminalProfile, shell_override: Option<&Path>) -> PathBuf {
    shell_override
        .map(Path::to_path_buf)
        .or_else(|| profile.shell.clone())
        .unwrap_or_else(|| Platform::shell().default_shell())
}

/// Profile args, or the interactive flags of the detected shell family
pub fn resolve_args(profile: &TerminalProfile, shell: &Path) -> Vec<String> {
    if !profile.args.is_empty() {
        return profile.args.clone();
    }
    ShellType::detect(shell).interactive_args(profile.login_shell)
}

/// Inherited environment plus terminal capabilities, then profile overrides
pub fn build_environment(profile: &TerminalProfile) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    for (key, value) in Platform::shell().terminal_env() {
        env.insert(key.to_string(), value.to_string());
    }
    for (key, value) in &profile.env {
        env.insert(key.clone(), value.clone());
    }
    env
}

/// Requested directory, else profile directory, else our own cwd
pub fn resolve_cwd(requested: Option<&Path>, profile: &TerminalProfile) -> PathBuf {
    requested
        .filter(|dir| dir.is_dir())
        .or_else(|| profile.cwd.as_deref().filter(|dir| dir.is_dir()))
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Validate the shell exists and is executable
pub fn validate_shell(shell: &Path) -> Result<PathBuf> {
    let fs_ops = Platform::filesystem();
    let resolved = fs_ops
        .find_command(&shell.to_string_lossy())
        .ok_or_else(|| Error::ShellNotFound {
            shell: shell.display().to_string(),
        })?;

    if !fs_ops.is_executable(&resolved) {
        return Err(Error::PermissionDenied { path: resolved });
    }
    Ok(resolved)
}

/// Resolve a profile into a validated spawn request
pub fn resolve_request(
    profile: &TerminalProfile,
    shell_override: Option<&Path>,
    cwd: Option<&Path>,
    size: TerminalSize,
) -> Result<SpawnRequest> {
    let shell = resolve_shell(profile, shell_override);
    let program = validate_shell(&shell)?;
    Ok(SpawnRequest {
        args: resolve_args(profile, &program),
        program,
        env: build_environment(profile),
        cwd: resolve_cwd(cwd, profile),
        size,
    })
}
