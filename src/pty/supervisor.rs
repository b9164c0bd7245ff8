//! Process supervisor
//!
//! Sole owner of the live process handles, keyed by session. Every other
//! component talks to a shell through the supervisor and only by id, so a
//! handle can never outlive the session that owns it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use super::process::{resolve_request, ProcessIo, ProcessSpawner, ShellProcess, SpawnRequest};
use crate::catalog::TerminalProfile;
use crate::error::{Error, Result};
use crate::models::{ProcessExit, PtyProcess, SessionId, TerminalSize};

/// A spawned process as seen by the session layer
#[derive(Debug)]
pub struct ProcessStart {
    pub pid: Option<u32>,
    pub io: ProcessIo,
}

struct Supervised {
    handle: Arc<dyn ShellProcess>,
    info: PtyProcess,
}

/// Owns and drives the shell processes of all sessions
pub struct ProcessSupervisor {
    spawner: Arc<dyn ProcessSpawner>,
    processes: Mutex<HashMap<SessionId, Supervised>>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("processes", &self.lock().len())
            .finish()
    }
}

impl ProcessSupervisor {
    pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            spawner,
            processes: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a profile into a validated spawn request
    pub fn prepare(
        &self,
        profile: &TerminalProfile,
        shell_override: Option<&Path>,
        cwd: Option<&Path>,
        size: TerminalSize,
    ) -> Result<SpawnRequest> {
        resolve_request(profile, shell_override, cwd, size)
    }

    /// Spawn a process for `id` and take ownership of its handle
    pub async fn spawn(&self, id: SessionId, request: SpawnRequest) -> Result<ProcessStart> {
        let command = request.program.display().to_string();
        let args = request.args.clone();
        let cwd = request.cwd.clone();

        let spawned = self.spawner.spawn(request).await?;
        let pid = spawned.process.pid();
        let info = PtyProcess::started(command, args, cwd, pid);
        debug!("Supervising {} for session {}", info, id);

        self.lock().insert(
            id,
            Supervised {
                handle: spawned.process,
                info,
            },
        );

        Ok(ProcessStart {
            pid,
            io: spawned.io,
        })
    }

    /// Queue input for the process
    pub fn write(&self, id: SessionId, data: &[u8]) -> Result<()> {
        let handle = self.handle(id)?;
        if handle.has_exited() {
            return Err(Error::ProcessAlreadyTerminated { id });
        }
        handle.write(data).map_err(|e| {
            if handle.has_exited() {
                Error::ProcessAlreadyTerminated { id }
            } else {
                Error::WriteFailure {
                    id,
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Resize the pty. A no-op once the process has exited.
    pub fn resize(&self, id: SessionId, size: TerminalSize) -> Result<()> {
        let handle = self.handle(id)?;
        if handle.has_exited() {
            return Ok(());
        }
        if let Err(e) = handle.resize(size) {
            // Racing with exit is expected
            debug!("Resize of session {} failed: {}", id, e);
        }
        Ok(())
    }

    /// Force-kill the process. Killing an exited process is a no-op.
    pub fn kill(&self, id: SessionId) -> Result<()> {
        let handle = self.handle(id)?;
        if handle.has_exited() {
            return Ok(());
        }
        info!("Killing process of session {} (pid {:?})", id, handle.pid());
        handle.kill().map_err(Error::Io)
    }

    /// Record how the process ended
    pub fn mark_exited(&self, id: SessionId, exit: ProcessExit) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.info.mark_terminated(exit);
        }
    }

    /// Drop the handle, returning its bookkeeping. Does not kill.
    pub fn release(&self, id: SessionId) -> Option<PtyProcess> {
        self.lock().remove(&id).map(|entry| entry.info)
    }

    /// Kill every live process. Returns how many were signalled.
    pub fn kill_all(&self) -> usize {
        let live: Vec<(SessionId, Arc<dyn ShellProcess>)> = self
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.handle.has_exited())
            .map(|(id, entry)| (*id, Arc::clone(&entry.handle)))
            .collect();

        for (id, handle) in &live {
            if let Err(e) = handle.kill() {
                warn!("Failed to kill process of session {}: {}", id, e);
            }
        }
        live.len()
    }

    /// Number of processes still running
    pub fn live_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| !entry.handle.has_exited())
            .count()
    }

    pub fn is_alive(&self, id: SessionId) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|entry| !entry.handle.has_exited())
    }

    pub fn pid(&self, id: SessionId) -> Option<u32> {
        self.lock().get(&id).and_then(|entry| entry.handle.pid())
    }

    /// Bookkeeping for a supervised process
    pub fn info(&self, id: SessionId) -> Option<PtyProcess> {
        self.lock().get(&id).map(|entry| entry.info.clone())
    }

    fn handle(&self, id: SessionId) -> Result<Arc<dyn ShellProcess>> {
        self.lock()
            .get(&id)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or(Error::SessionNotFound { id })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Supervised>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
