//! Session registry
//!
//! Owns the session records and drives their lifecycle:
//! `Connecting -> Running -> Exited | Failed`. The registry coordinates the
//! supervisor (processes), the bridge (output) and observers such as the
//! split view manager whenever a session comes or goes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::events::{SessionEvent, SessionEventBus, SessionEventSubscription, SessionObserver};
use super::pump;
use crate::bridge::IoBridge;
use crate::catalog::{ProfileThemeCatalog, DEFAULT_PROFILE, DEFAULT_THEME};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::models::{ProcessExit, SessionId, SessionStatus, TerminalSession, TerminalSize};
use crate::pty::ProcessSupervisor;

/// Parameters of a new session. Unset fields fall back to the registry
/// defaults.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub profile: Option<String>,
    pub theme: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Overrides the profile's shell
    pub shell: Option<PathBuf>,
    pub size: Option<TerminalSize>,
    /// Make the new session the active one
    pub activate: bool,
}

impl Default for CreateSessionRequest {
    fn default() -> Self {
        Self {
            profile: None,
            theme: None,
            cwd: None,
            shell: None,
            size: None,
            activate: true,
        }
    }
}

impl CreateSessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn size(mut self, size: TerminalSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }
}

/// Registry defaults
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub default_profile: String,
    pub default_theme: String,
    pub default_size: TerminalSize,
    /// Keep exited sessions instead of removing them
    pub retain_exited: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            default_profile: DEFAULT_PROFILE.to_string(),
            default_theme: DEFAULT_THEME.to_string(),
            default_size: TerminalSize::default(),
            retain_exited: false,
        }
    }
}

impl From<&SessionConfig> for RegistryOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            default_profile: config.default_profile.clone(),
            default_theme: config.default_theme.clone(),
            default_size: config.size(),
            retain_exited: config.retain_exited,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<SessionId, TerminalSession>,
    /// Creation order
    order: Vec<SessionId>,
    active: Option<SessionId>,
}

impl RegistryState {
    /// Newest running session other than `excluding`
    fn newest_live(&self, excluding: SessionId) -> Option<SessionId> {
        self.order
            .iter()
            .rev()
            .copied()
            .filter(|id| *id != excluding)
            .find(|id| self.sessions.get(id).is_some_and(|s| s.is_running()))
    }

    fn set_active(&mut self, id: Option<SessionId>, events: &SessionEventBus) {
        if let Some(previous) = self.active.take() {
            if let Some(session) = self.sessions.get_mut(&previous) {
                session.is_active = false;
            }
        }
        if let Some(id) = id {
            if let Some(session) = self.sessions.get_mut(&id) {
                session.is_active = true;
                session.touch();
                self.active = Some(id);
                events.publish(SessionEvent::Activated { id });
            }
        }
    }

    /// Move the active flag off `leaving` when it holds it
    fn promote_from(&mut self, leaving: SessionId, events: &SessionEventBus) {
        if self.active == Some(leaving) {
            let next = self.newest_live(leaving);
            self.set_active(next, events);
        }
    }
}

pub(crate) struct RegistryInner {
    state: Mutex<RegistryState>,
    catalog: Arc<ProfileThemeCatalog>,
    supervisor: Arc<ProcessSupervisor>,
    bridge: Arc<IoBridge>,
    events: SessionEventBus,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
    options: RegistryOptions,
}

/// Registry of terminal sessions. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(
        catalog: Arc<ProfileThemeCatalog>,
        supervisor: Arc<ProcessSupervisor>,
        bridge: Arc<IoBridge>,
        options: RegistryOptions,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
                catalog,
                supervisor,
                bridge,
                events: SessionEventBus::default(),
                observers: Mutex::new(Vec::new()),
                options,
            }),
        }
    }

    /// Create a session and spawn its shell.
    ///
    /// Profile and theme are checked before anything is stored. The record
    /// is visible as `Connecting` while the spawn is in flight.
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<TerminalSession> {
        let inner = &self.inner;
        let profile_name = request
            .profile
            .unwrap_or_else(|| inner.options.default_profile.clone());
        let theme_name = request
            .theme
            .unwrap_or_else(|| inner.options.default_theme.clone());

        let profile = inner.catalog.get_profile(&profile_name)?;
        if !inner.catalog.has_theme(&theme_name) {
            return Err(Error::ThemeNotFound { name: theme_name });
        }

        let size = request.size.unwrap_or(inner.options.default_size);
        let id = SessionId::new();
        let initial_cwd = request
            .cwd
            .clone()
            .or_else(|| profile.cwd.clone())
            .unwrap_or_default();

        {
            let mut state = inner.lock();
            state.sessions.insert(
                id,
                TerminalSession::new(id, profile_name.clone(), theme_name, initial_cwd, size),
            );
            state.order.push(id);
        }
        inner.bridge.open(id);
        debug!("Session {} connecting with profile '{}'", id, profile_name);

        let spawned = match inner.supervisor.prepare(
            &profile,
            request.shell.as_deref(),
            request.cwd.as_deref(),
            size,
        ) {
            Ok(spawn_request) => {
                let cwd = spawn_request.cwd.clone();
                inner
                    .supervisor
                    .spawn(id, spawn_request)
                    .await
                    .map(|start| (cwd, start))
            }
            Err(e) => Err(e),
        };

        let (cwd, start) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("Session {} failed to start: {}", id, e);
                {
                    let mut state = inner.lock();
                    if let Some(mut session) = state.sessions.remove(&id) {
                        session.transition(SessionStatus::Failed);
                        state.order.retain(|other| *other != id);
                        inner.events.publish(SessionEvent::Failed {
                            id,
                            reason: e.to_string(),
                        });
                    }
                }
                inner.bridge.close(id);
                return Err(e);
            }
        };

        let snapshot = {
            let mut state = inner.lock();
            match state.sessions.get_mut(&id) {
                Some(session) => {
                    session.transition(SessionStatus::Running);
                    session.pid = start.pid;
                    session.cwd = cwd;
                    inner.events.publish(SessionEvent::Created { id, pid: start.pid });

                    if request.activate || state.active.is_none() {
                        state.set_active(Some(id), &inner.events);
                    }
                    state.sessions.get(&id).cloned()
                }
                None => None,
            }
        };

        let Some(snapshot) = snapshot else {
            // Disposed while connecting
            info!("Session {} was removed while connecting, killing its process", id);
            let _ = inner.supervisor.kill(id);
            inner.supervisor.release(id);
            inner.bridge.close(id);
            return Err(Error::SessionNotFound { id });
        };

        pump::spawn(Arc::downgrade(&self.inner), id, start.io);
        info!(
            "Session {} running (profile '{}', pid {:?})",
            id, snapshot.profile_name, snapshot.pid
        );
        Ok(snapshot)
    }

    /// Kill (if running) and delete a session
    pub fn remove_session(&self, id: SessionId) -> Result<()> {
        self.inner.remove(id, true)
    }

    /// Make `id` the active session
    pub fn activate_session(&self, id: SessionId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.sessions.contains_key(&id) {
            return Err(Error::SessionNotFound { id });
        }
        if state.active != Some(id) {
            state.set_active(Some(id), &self.inner.events);
        }
        Ok(())
    }

    /// Snapshots in creation order
    pub fn get_all_sessions(&self) -> Vec<TerminalSession> {
        let state = self.inner.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id).cloned())
            .collect()
    }

    pub fn get_session(&self, id: SessionId) -> Result<TerminalSession> {
        self.inner
            .lock()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound { id })
    }

    pub fn get_active_session(&self) -> Option<TerminalSession> {
        let state = self.inner.lock();
        state.active.and_then(|id| state.sessions.get(&id).cloned())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.lock().sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward user input to the session's shell
    pub fn write(&self, id: SessionId, data: &[u8]) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::SessionNotFound { id });
        }

        match self.inner.bridge.write_user_input(id, data) {
            Ok(()) => {
                if let Some(session) = self.inner.lock().sessions.get_mut(&id) {
                    session.touch();
                }
                Ok(())
            }
            Err(Error::WriteFailure { id, reason }) => {
                self.inner.handle_write_failure(id, reason.clone());
                Err(Error::WriteFailure { id, reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Resize the session's terminal. Unknown or exited sessions are ignored.
    pub fn resize(&self, id: SessionId, size: TerminalSize) -> Result<()> {
        {
            let mut state = self.inner.lock();
            match state.sessions.get_mut(&id) {
                Some(session) if session.is_running() => session.size = size,
                _ => {
                    debug!("Ignoring resize of session {}", id);
                    return Ok(());
                }
            }
        }
        self.inner.bridge.resize(id, size)
    }

    pub fn set_title(&self, id: SessionId, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        let mut state = self.inner.lock();
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(Error::SessionNotFound { id })?;
        if session.title != title {
            session.title = title.clone();
            self.inner
                .events
                .publish(SessionEvent::TitleChanged { id, title });
        }
        Ok(())
    }

    /// Record activity on a session
    pub fn touch(&self, id: SessionId) -> Result<()> {
        self.inner
            .lock()
            .sessions
            .get_mut(&id)
            .map(TerminalSession::touch)
            .ok_or(Error::SessionNotFound { id })
    }

    /// Kill and remove every session. Returns how many were removed.
    pub fn dispose_all(&self) -> usize {
        let ids: Vec<SessionId> = self.inner.lock().order.clone();
        let removed = ids
            .into_iter()
            .filter(|id| self.inner.remove(*id, true).is_ok())
            .count();
        if removed > 0 {
            info!("Disposed {} sessions", removed);
        }
        removed
    }

    pub fn subscribe(&self) -> SessionEventSubscription {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &SessionEventBus {
        &self.inner.events
    }

    /// Register a hook run after every removal
    pub fn add_observer(&self, observer: Weak<dyn SessionObserver>) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn catalog(&self) -> &Arc<ProfileThemeCatalog> {
        &self.inner.catalog
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.inner.supervisor
    }

    pub fn bridge(&self) -> &Arc<IoBridge> {
        &self.inner.bridge
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.inner.options
    }
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn bridge(&self) -> &IoBridge {
        &self.bridge
    }

    /// Delete a record and tear down its process and channel
    fn remove(&self, id: SessionId, kill: bool) -> Result<()> {
        {
            let mut state = self.lock();
            if state.sessions.remove(&id).is_none() {
                return Err(Error::SessionNotFound { id });
            }
            state.order.retain(|other| *other != id);
            if state.active == Some(id) {
                state.active = None;
                let next = state.newest_live(id);
                state.set_active(next, &self.events);
            }
            self.events.publish(SessionEvent::Removed { id });
        }

        if kill {
            match self.supervisor.kill(id) {
                // Still connecting: the creator kills the process
                Ok(()) | Err(Error::SessionNotFound { .. }) => {}
                Err(e) => warn!("Failed to kill session {}: {}", id, e),
            }
        }
        self.supervisor.release(id);
        self.bridge.close(id);
        info!("Session {} removed", id);

        self.notify_removed(id);
        Ok(())
    }

    fn live_observers(&self) -> Vec<Arc<dyn SessionObserver>> {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        observers.retain(|observer| observer.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }

    fn notify_removed(&self, id: SessionId) {
        for observer in self.live_observers() {
            observer.session_removed(id);
        }
    }

    fn notify_exited(&self, id: SessionId) {
        for observer in self.live_observers() {
            observer.session_exited(id);
        }
    }

    /// The process ended on its own. Runs once its output has been drained.
    pub(crate) fn handle_exit(&self, id: SessionId, exit: ProcessExit) {
        {
            let mut state = self.lock();
            let Some(session) = state.sessions.get_mut(&id) else {
                return;
            };
            if !session.transition(SessionStatus::Exited) {
                return;
            }
            session.exit = Some(exit.clone());
            info!("Session {} exited: {:?}", id, exit);
            self.events.publish(SessionEvent::Exited {
                id,
                exit: exit.clone(),
            });

            if self.options.retain_exited {
                state.promote_from(id, &self.events);
            }
        }
        self.supervisor.mark_exited(id, exit);

        if self.options.retain_exited {
            self.notify_exited(id);
        } else {
            // Nothing left to kill
            let _ = self.remove(id, false);
        }
    }

    /// Stdin of the process broke: report it and force the session out
    pub(crate) fn handle_write_failure(&self, id: SessionId, message: String) {
        {
            let state = self.lock();
            if !state.sessions.contains_key(&id) {
                return;
            }
            error!("Write to session {} failed: {}", id, message);
            self.events.publish(SessionEvent::Error { id, message });
        }
        let _ = self.remove(id, true);
    }
}
