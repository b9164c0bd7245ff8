//! Native pseudoterminal processes
//!
//! Spawns shells on a real pty via `portable-pty`. Each process gets three
//! helper threads: a reader forwarding pty output, a writer draining queued
//! input, and a waiter blocking on the child's exit status.

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender as StdSender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::{mpsc, oneshot};

use super::process::{ProcessIo, ProcessSpawner, ShellProcess, SpawnRequest, SpawnedProcess};
use super::signals::kill_process_group;
use super::streams::{spawn_reader_thread, spawn_writer_thread};
use crate::error::{Error, Result};
use crate::models::{ProcessExit, TerminalSize};

/// Spawner backed by the platform's native pty system
#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl PtySpawner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessSpawner for PtySpawner {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnedProcess> {
        let command = request.program.display().to_string();
        tokio::task::spawn_blocking(move || spawn_native(request))
            .await
            .map_err(|e| Error::SpawnFailed {
                command,
                reason: e.to_string(),
            })?
    }
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn spawn_native(request: SpawnRequest) -> Result<SpawnedProcess> {
    let command = request.program.display().to_string();
    let spawn_failed = |reason: String| Error::SpawnFailed {
        command: command.clone(),
        reason,
    };

    let pair = native_pty_system()
        .openpty(pty_size(request.size))
        .map_err(|e| spawn_failed(e.to_string()))?;

    let mut cmd = CommandBuilder::new(&request.program);
    cmd.args(&request.args);
    cmd.env_clear();
    for (key, value) in &request.env {
        cmd.env(key, value);
    }
    cmd.cwd(&request.cwd);

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| spawn_failed(e.to_string()))?;
    // Only the child holds the slave now, so the reader sees EOF when it exits
    drop(pair.slave);

    let pid = child.process_id();
    match attach(pair.master, &mut child, pid) {
        Ok((process, io)) => {
            let exited = Arc::clone(&process.exited);
            spawn_waiter(child, pid, exited, io.exit_tx).map_err(|e| {
                let _ = process.kill();
                spawn_failed(e.to_string())
            })?;

            info!("Spawned {} (pid {:?})", command, pid);
            Ok(SpawnedProcess {
                process: Arc::new(process),
                io: io.receivers,
            })
        }
        Err(e) => {
            let _ = child.kill();
            Err(spawn_failed(e.to_string()))
        }
    }
}

struct AttachedIo {
    receivers: ProcessIo,
    exit_tx: oneshot::Sender<ProcessExit>,
}

fn attach(
    master: Box<dyn MasterPty + Send>,
    child: &mut Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
) -> io::Result<(NativeProcess, AttachedIo)> {
    let to_io = |e: anyhow::Error| io::Error::new(io::ErrorKind::Other, e.to_string());
    let label = pid.map_or_else(|| "?".to_string(), |pid| pid.to_string());

    let reader = master.try_clone_reader().map_err(to_io)?;
    let writer = master.take_writer().map_err(to_io)?;

    let (stdout_tx, stdout) = mpsc::unbounded_channel();
    let (_, stderr) = mpsc::unbounded_channel();
    let (failures_tx, failures) = mpsc::unbounded_channel();
    let (exit_tx, exit) = oneshot::channel();

    spawn_reader_thread(format!("pty-read-{label}"), reader, stdout_tx)?;
    let input = spawn_writer_thread(format!("pty-write-{label}"), writer, failures_tx)?;

    let process = NativeProcess {
        pid,
        master: Mutex::new(master),
        input: Mutex::new(Some(input)),
        killer: Mutex::new(child.clone_killer()),
        exited: Arc::new(AtomicBool::new(false)),
    };

    let io = AttachedIo {
        receivers: ProcessIo {
            stdout,
            stderr,
            exit,
            failures,
        },
        exit_tx,
    };
    Ok((process, io))
}

fn spawn_waiter(
    mut child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    exited: Arc<AtomicBool>,
    exit_tx: oneshot::Sender<ProcessExit>,
) -> io::Result<()> {
    let label = pid.map_or_else(|| "?".to_string(), |pid| pid.to_string());
    thread::Builder::new()
        .name(format!("pty-wait-{label}"))
        .spawn(move || {
            let exit = match child.wait() {
                Ok(status) => ProcessExit {
                    code: status.exit_code(),
                    signal: status.signal().map(str::to_string),
                },
                Err(e) => {
                    warn!("Failed to wait for pid {:?}: {}", pid, e);
                    ProcessExit::with_code(1)
                }
            };
            exited.store(true, Ordering::SeqCst);
            debug!("pid {:?} exited: {:?}", pid, exit);
            let _ = exit_tx.send(exit);
        })?;
    Ok(())
}

/// A shell running on a native pty
pub struct NativeProcess {
    pid: Option<u32>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    /// `None` once killed
    input: Mutex<Option<StdSender<Vec<u8>>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    exited: Arc<AtomicBool>,
}

impl fmt::Debug for NativeProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProcess")
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}

fn broken_pipe(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, reason.to_string())
}

impl ShellProcess for NativeProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        if self.has_exited() {
            return Err(broken_pipe("process exited"));
        }
        let input = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        match input.as_ref() {
            Some(tx) => tx
                .send(data.to_vec())
                .map_err(|_| broken_pipe("stdin writer stopped")),
            None => Err(broken_pipe("process killed")),
        }
    }

    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.master
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resize(pty_size(size))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }

    fn kill(&self) -> io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }

        // Stop accepting input
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let group_kill = match self.pid {
            Some(pid) => kill_process_group(pid),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no pid")),
        };

        if let Err(e) = group_kill {
            debug!(
                "Process group kill for {:?} failed ({}), using child killer",
                self.pid, e
            );
            self.killer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .kill()?;
        }
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}
