//! Scriptable in-memory processes
//!
//! `FakeSpawner` hands out [`FakeProcess`]es whose output, exit and stdin
//! failures are driven by the caller. Used by the test suites and handy for
//! running the daemon without spawning real shells.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::process::{ProcessIo, ProcessSpawner, ShellProcess, SpawnRequest, SpawnedProcess};
use crate::error::{Error, Result};
use crate::models::{ProcessExit, TerminalSize};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct FakeSpawnerState {
    processes: Vec<Arc<FakeProcess>>,
    failing_programs: HashSet<PathBuf>,
    fail_all: bool,
    delay: Option<Duration>,
}

/// Spawner producing [`FakeProcess`]es
#[derive(Debug)]
pub struct FakeSpawner {
    state: Mutex<FakeSpawnerState>,
    next_pid: AtomicU32,
    echo: bool,
}

impl FakeSpawner {
    /// Processes echo their input back as output, like a tty in cooked mode
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeSpawnerState::default()),
            next_pid: AtomicU32::new(10_000),
            echo: true,
        }
    }

    /// Processes that swallow their input silently
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    /// Fail every spawn of `program`
    pub fn fail_program(&self, program: impl Into<PathBuf>) {
        lock(&self.state).failing_programs.insert(program.into());
    }

    /// Fail every spawn
    pub fn fail_all(&self, fail: bool) {
        lock(&self.state).fail_all = fail;
    }

    /// Delay each spawn, to observe sessions in the `Connecting` state
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    /// Every process spawned so far, oldest first
    pub fn processes(&self) -> Vec<Arc<FakeProcess>> {
        lock(&self.state).processes.clone()
    }

    /// Most recently spawned process
    pub fn last(&self) -> Option<Arc<FakeProcess>> {
        lock(&self.state).processes.last().cloned()
    }

    pub fn spawn_count(&self) -> usize {
        lock(&self.state).processes.len()
    }

    /// Process with the given pid
    pub fn find(&self, pid: u32) -> Option<Arc<FakeProcess>> {
        lock(&self.state)
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
    }
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSpawner for FakeSpawner {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnedProcess> {
        let (delay, fail) = {
            let state = lock(&self.state);
            (
                state.delay,
                state.fail_all || state.failing_programs.contains(&request.program),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(Error::SpawnFailed {
                command: request.program.display().to_string(),
                reason: "spawn refused by fake spawner".to_string(),
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (process, io) = FakeProcess::new(pid, request, self.echo);
        let process = Arc::new(process);
        lock(&self.state).processes.push(Arc::clone(&process));

        Ok(SpawnedProcess {
            process,
            io,
        })
    }
}

/// In-memory stand-in for a shell
#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    request: SpawnRequest,
    echo: bool,
    stdout: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    stderr: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    failures: mpsc::UnboundedSender<String>,
    exit: Mutex<Option<oneshot::Sender<ProcessExit>>>,
    written: Mutex<Vec<u8>>,
    size: Mutex<TerminalSize>,
    exited: AtomicBool,
    killed: AtomicBool,
    broken_stdin: AtomicBool,
}

impl FakeProcess {
    fn new(pid: u32, request: SpawnRequest, echo: bool) -> (Self, ProcessIo) {
        let (stdout_tx, stdout) = mpsc::unbounded_channel();
        let (stderr_tx, stderr) = mpsc::unbounded_channel();
        let (failures_tx, failures) = mpsc::unbounded_channel();
        let (exit_tx, exit) = oneshot::channel();

        let process = Self {
            pid,
            size: Mutex::new(request.size),
            request,
            echo,
            stdout: Mutex::new(Some(stdout_tx)),
            stderr: Mutex::new(Some(stderr_tx)),
            failures: failures_tx,
            exit: Mutex::new(Some(exit_tx)),
            written: Mutex::new(Vec::new()),
            exited: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            broken_stdin: AtomicBool::new(false),
        };
        let io = ProcessIo {
            stdout,
            stderr,
            exit,
            failures,
        };
        (process, io)
    }

    /// Produce output. Returns `false` once the process has exited.
    pub fn emit_stdout(&self, data: &[u8]) -> bool {
        lock(&self.stdout)
            .as_ref()
            .is_some_and(|tx| tx.send(data.to_vec()).is_ok())
    }

    pub fn emit_stderr(&self, data: &[u8]) -> bool {
        lock(&self.stderr)
            .as_ref()
            .is_some_and(|tx| tx.send(data.to_vec()).is_ok())
    }

    /// Terminate: close the output streams, then report `exit`.
    /// Only the first call has an effect.
    pub fn exit(&self, exit: ProcessExit) {
        if self.exited.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.stdout).take();
        lock(&self.stderr).take();
        if let Some(tx) = lock(&self.exit).take() {
            let _ = tx.send(exit);
        }
    }

    /// Subsequent writes fail asynchronously, like a closed stdin pipe
    pub fn break_stdin(&self) {
        self.broken_stdin.store(true, Ordering::SeqCst);
    }

    /// Everything written to stdin so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.written).clone()
    }

    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    pub fn size(&self) -> TerminalSize {
        *lock(&self.size)
    }

    pub fn request(&self) -> &SpawnRequest {
        &self.request
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

impl ShellProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        if self.has_exited() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "process exited"));
        }
        if self.broken_stdin.load(Ordering::SeqCst) {
            let _ = self.failures.send("Broken pipe (os error 32)".to_string());
            return Ok(());
        }

        lock(&self.written).extend_from_slice(data);
        if self.echo {
            self.emit_stdout(data);
        }
        Ok(())
    }

    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        if !self.has_exited() {
            *lock(&self.size) = size;
        }
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        if !self.has_exited() {
            self.killed.store(true, Ordering::SeqCst);
            self.exit(ProcessExit::with_signal("Killed"));
        }
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}
