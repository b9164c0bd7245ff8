//! Reconnection and disposal coordinator
//!
//! Tracks which UI host owns which sessions. A host that drops its
//! connection gets a grace period to come back: its sessions keep running
//! with output buffered in the bridge. If the host returns in time the
//! buffers are replayed; otherwise its sessions are killed and removed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::protocol::HostId;
use crate::bridge::OutputSink;
use crate::error::{Error, Result};
use crate::models::SessionId;
use crate::session::{SessionObserver, SessionRegistry};

/// One transport connection of a host, returned by
/// [`HostCoordinator::connect`]. A disconnect reported for a connection the
/// host has since replaced is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostConnection {
    pub host: HostId,
    generation: u64,
}

#[derive(Debug, Default)]
struct HostEntry {
    /// Set while the host is connected
    sink: Option<Arc<dyn OutputSink>>,
    sessions: HashSet<SessionId>,
    timer: Option<JoinHandle<()>>,
    /// Renewed on every (dis)connect so a stale timer or connection can
    /// tell it lost
    generation: u64,
}

impl HostEntry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    hosts: HashMap<HostId, HostEntry>,
    owners: HashMap<SessionId, HostId>,
    /// Last generation handed out, across all hosts
    generation: u64,
}

impl CoordinatorState {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Host ownership, grace timers and shutdown
pub struct HostCoordinator {
    registry: SessionRegistry,
    grace: Duration,
    state: Mutex<CoordinatorState>,
    this: Weak<HostCoordinator>,
}

impl std::fmt::Debug for HostCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("HostCoordinator")
            .field("hosts", &state.hosts.len())
            .field("owned_sessions", &state.owners.len())
            .field("grace", &self.grace)
            .finish()
    }
}

impl HostCoordinator {
    /// Create a coordinator and subscribe it to session removals
    pub fn new(registry: SessionRegistry, grace: Duration) -> Arc<Self> {
        let coordinator = Arc::new_cyclic(|this| Self {
            registry,
            grace,
            state: Mutex::new(CoordinatorState::default()),
            this: this.clone(),
        });
        let observer: Weak<HostCoordinator> = Arc::downgrade(&coordinator);
        let observer: Weak<dyn SessionObserver> = observer;
        coordinator.registry.add_observer(observer);
        coordinator
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Connect or reconnect a host. Cancels a pending grace timer and
    /// reattaches every session the host owns, replaying buffered output.
    /// Any earlier connection of the same host is superseded.
    pub fn connect(&self, host: HostId, sink: Arc<dyn OutputSink>) -> HostConnection {
        let mut state = self.lock();
        let generation = state.next_generation();
        let entry = state.hosts.entry(host).or_default();
        let reconnect = entry.timer.is_some() || entry.sink.is_some();
        entry.cancel_timer();
        entry.generation = generation;
        entry.sink = Some(Arc::clone(&sink));

        let bridge = self.registry.bridge();
        let mut attached = 0;
        for id in &entry.sessions {
            match bridge.attach(*id, Arc::clone(&sink)) {
                Ok(replayed) => {
                    attached += 1;
                    debug!("Host {} reattached session {} ({} bytes)", host, id, replayed);
                }
                Err(e) => debug!("Host {} could not reattach {}: {}", host, id, e),
            }
        }

        if reconnect {
            info!("Host {} reconnected, {} sessions reattached", host, attached);
        } else {
            info!("Host {} connected", host);
        }
        HostConnection {
            host,
            generation: entry.generation,
        }
    }

    /// Give `host` exclusive ownership of a session and attach it
    pub fn claim(&self, host: HostId, session: SessionId) -> Result<()> {
        if !self.registry.contains(session) {
            return Err(Error::SessionNotFound { id: session });
        }

        let mut state = self.lock();
        if let Some(previous) = state.owners.insert(session, host) {
            if previous != host {
                if let Some(entry) = state.hosts.get_mut(&previous) {
                    entry.sessions.remove(&session);
                }
                debug!("Session {} moved from host {} to {}", session, previous, host);
            }
        }

        let entry = state.hosts.entry(host).or_default();
        entry.sessions.insert(session);
        match &entry.sink {
            Some(sink) => {
                self.registry.bridge().attach(session, Arc::clone(sink))?;
            }
            None => {
                let _ = self.registry.bridge().detach(session);
            }
        }
        Ok(())
    }

    /// The host's transport went away: detach its sessions and start the
    /// grace timer. No-op when the host has connected again since.
    pub fn disconnect(&self, connection: HostConnection) {
        let host = connection.host;
        let mut state = self.lock();
        let generation = state.next_generation();
        let Some(entry) = state.hosts.get_mut(&host) else {
            return;
        };
        if entry.generation != connection.generation {
            debug!("Ignoring disconnect of a superseded connection of host {}", host);
            return;
        }
        if entry.sink.take().is_none() {
            // Already disconnected
            return;
        }

        if entry.sessions.is_empty() {
            state.hosts.remove(&host);
            info!("Host {} disconnected", host);
            return;
        }

        let bridge = self.registry.bridge();
        for id in &entry.sessions {
            let _ = bridge.detach(*id);
        }

        entry.cancel_timer();
        entry.generation = generation;
        let this = self.this.clone();
        let grace = self.grace;
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(coordinator) = this.upgrade() {
                coordinator.expire(host, generation);
            }
        }));
        info!(
            "Host {} disconnected, {} sessions kept for {:?}",
            host,
            entry.sessions.len(),
            grace
        );
    }

    /// Grace timer fired: remove everything the host still owns
    fn expire(&self, host: HostId, generation: u64) {
        let sessions: Vec<SessionId> = {
            let mut state = self.lock();
            match state.hosts.get(&host) {
                Some(entry) if entry.generation == generation && entry.sink.is_none() => {}
                _ => return,
            }
            let Some(entry) = state.hosts.remove(&host) else {
                return;
            };
            for id in &entry.sessions {
                state.owners.remove(id);
            }
            entry.sessions.into_iter().collect()
        };

        let timeout = Error::HostDisconnectTimeout {
            host_id: host.to_string(),
            grace: self.grace,
        };
        warn!("{}, killing {} sessions", timeout, sessions.len());

        for id in sessions {
            if let Err(e) = self.registry.remove_session(id) {
                debug!("Session {} already gone: {}", id, e);
            }
        }
    }

    /// Forget ownership of a removed session
    pub fn release(&self, session: SessionId) {
        let mut state = self.lock();
        if let Some(host) = state.owners.remove(&session) {
            if let Some(entry) = state.hosts.get_mut(&host) {
                entry.sessions.remove(&session);
            }
        }
    }

    /// Cancel every timer and kill every session, without grace
    pub fn shutdown(&self) -> usize {
        {
            let mut state = self.lock();
            for entry in state.hosts.values_mut() {
                entry.cancel_timer();
            }
            state.hosts.clear();
            state.owners.clear();
        }
        let removed = self.registry.dispose_all();
        info!("Coordinator shut down, {} sessions killed", removed);
        removed
    }

    pub fn owner_of(&self, session: SessionId) -> Option<HostId> {
        self.lock().owners.get(&session).copied()
    }

    /// Sessions owned by `host`, in no particular order
    pub fn owned_sessions(&self, host: HostId) -> Vec<SessionId> {
        self.lock()
            .hosts
            .get(&host)
            .map(|entry| entry.sessions.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, host: HostId) -> bool {
        self.lock()
            .hosts
            .get(&host)
            .is_some_and(|entry| entry.sink.is_some())
    }

    /// Whether `host` is inside its grace period
    pub fn is_pending(&self, host: HostId) -> bool {
        self.lock()
            .hosts
            .get(&host)
            .is_some_and(|entry| entry.timer.is_some() && entry.sink.is_none())
    }
}

impl SessionObserver for HostCoordinator {
    fn session_removed(&self, id: SessionId) {
        self.release(id);
    }
}
