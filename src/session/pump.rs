//! Per-session output pump
//!
//! One task per running session moves process output into the bridge and
//! turns process-level signals (exit, broken stdin) into registry calls.
//! The task only holds a weak reference to the registry, so dropping the
//! registry stops every pump.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Instant};

use super::registry::RegistryInner;
use crate::models::{ProcessExit, SessionId};
use crate::pty::ProcessIo;

/// Wait for one trailing chunk after exit
const DRAIN_POLL: Duration = Duration::from_millis(100);
/// Upper bound on draining output after exit
const DRAIN_DEADLINE: Duration = Duration::from_secs(1);
/// How long a stdin failure waits for the matching exit
const EXIT_SETTLE: Duration = Duration::from_millis(250);

pub(crate) fn spawn(registry: Weak<RegistryInner>, id: SessionId, io: ProcessIo) {
    tokio::spawn(run(registry, id, io));
}

async fn run(registry: Weak<RegistryInner>, id: SessionId, io: ProcessIo) {
    let ProcessIo {
        mut stdout,
        mut stderr,
        mut exit,
        mut failures,
    } = io;
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut failures_open = true;

    let status = loop {
        tokio::select! {
            biased;

            chunk = stdout.recv(), if stdout_open => match chunk {
                Some(chunk) => {
                    if !forward(&registry, id, &chunk) {
                        return;
                    }
                }
                None => stdout_open = false,
            },
            chunk = stderr.recv(), if stderr_open => match chunk {
                Some(chunk) => {
                    if !forward(&registry, id, &chunk) {
                        return;
                    }
                }
                None => stderr_open = false,
            },
            status = &mut exit => break exit_status(id, status),
            failure = failures.recv(), if failures_open => match failure {
                // Stdin breaks when the process goes away, so an exit
                // reported shortly after still wins
                Some(message) => match timeout(EXIT_SETTLE, &mut exit).await {
                    Ok(status) => break exit_status(id, status),
                    Err(_) => {
                        let Some(inner) = registry.upgrade() else { return };
                        inner.handle_write_failure(id, message);
                        return;
                    }
                },
                None => failures_open = false,
            },
        }
    };

    // Output still queued behind the exit must reach the bridge first
    let deadline = Instant::now() + DRAIN_DEADLINE;
    if stdout_open {
        drain(&registry, id, &mut stdout, deadline).await;
    }
    if stderr_open {
        drain(&registry, id, &mut stderr, deadline).await;
    }

    if let Some(inner) = registry.upgrade() {
        inner.handle_exit(id, status);
    }
    debug!("Output pump for session {} finished", id);
}

fn exit_status(id: SessionId, status: Result<ProcessExit, oneshot::error::RecvError>) -> ProcessExit {
    match status {
        Ok(status) => status,
        Err(_) => {
            warn!("Session {} lost its exit status", id);
            ProcessExit::with_code(1)
        }
    }
}

/// Push a chunk into the bridge. `false` once there is nowhere to send it.
fn forward(registry: &Weak<RegistryInner>, id: SessionId, chunk: &[u8]) -> bool {
    let Some(inner) = registry.upgrade() else {
        return false;
    };
    match inner.bridge().push(id, chunk) {
        Ok(()) => true,
        Err(e) => {
            debug!("Stopping output pump for session {}: {}", id, e);
            false
        }
    }
}

async fn drain(
    registry: &Weak<RegistryInner>,
    id: SessionId,
    stream: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    deadline: Instant,
) {
    while Instant::now() < deadline {
        match timeout(DRAIN_POLL, stream.recv()).await {
            Ok(Some(chunk)) => {
                if !forward(registry, id, &chunk) {
                    return;
                }
            }
            Ok(None) | Err(_) => return,
        }
    }
}
