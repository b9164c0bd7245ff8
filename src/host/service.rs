//! Terminal service
//!
//! Wires the catalog, supervisor, bridge, registry, split manager and
//! coordinator together and answers host requests. The service is
//! transport-agnostic: a connection hands it parsed [`HostRequest`]s and an
//! outbound channel, and the socket server is one such transport.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use super::coordinator::{HostConnection, HostCoordinator};
use super::protocol::{HostId, HostMessage, HostRequest};
use crate::bridge::{ChannelSink, IoBridge};
use crate::catalog::ProfileThemeCatalog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::HistoryBuffer;
use crate::models::{SessionId, TerminalSession, TerminalSize};
use crate::pty::{ProcessSpawner, ProcessSupervisor, PtySpawner};
use crate::session::{CreateSessionRequest, RegistryOptions, SessionRegistry};
use crate::split::{SplitDirection, SplitViewManager};

/// Outbound half of a host connection
pub type HostSender = mpsc::UnboundedSender<HostMessage>;

/// All session components behind one host-facing API
pub struct TerminalService {
    config: Config,
    catalog: Arc<ProfileThemeCatalog>,
    history: Arc<HistoryBuffer>,
    registry: SessionRegistry,
    splits: Arc<SplitViewManager>,
    coordinator: Arc<HostCoordinator>,
}

impl std::fmt::Debug for TerminalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalService")
            .field("registry", &self.registry)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl TerminalService {
    /// Build every component from `config`, spawning shells with `spawner`
    pub fn new(config: Config, spawner: Arc<dyn ProcessSpawner>) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(config.build_catalog());
        let history = Arc::new(HistoryBuffer::new(config.history.capacity));
        let supervisor = Arc::new(ProcessSupervisor::new(spawner));
        let bridge = Arc::new(IoBridge::new(
            Arc::clone(&supervisor),
            Arc::clone(&history),
            config.bridge.buffer_capacity,
        ));
        let registry = SessionRegistry::new(
            Arc::clone(&catalog),
            supervisor,
            bridge,
            RegistryOptions::from(&config.session),
        );
        let splits = SplitViewManager::new(registry.clone());
        let coordinator = HostCoordinator::new(registry.clone(), config.coordinator.grace_period());

        info!(
            "Terminal service ready (buffer {} bytes, grace {:?})",
            config.bridge.buffer_capacity,
            coordinator.grace_period()
        );

        Ok(Self {
            config,
            catalog,
            history,
            registry,
            splits,
            coordinator,
        })
    }

    /// Service backed by real pseudoterminals
    pub fn native(config: Config) -> Result<Self> {
        Self::new(config, Arc::new(PtySpawner))
    }

    /// Register a host connection.
    ///
    /// Sends `welcome` on `outbound`, starts forwarding session events, then
    /// reattaches the host's sessions, replaying their buffered output.
    /// The returned connection is what [`disconnect`](Self::disconnect) takes.
    pub fn hello(&self, requested: Option<HostId>, outbound: HostSender) -> HostConnection {
        let host = requested.unwrap_or_default();
        let _ = outbound.send(HostMessage::Welcome { host_id: host });

        self.spawn_event_forwarder(host, outbound.clone());
        let sink = ChannelSink::<HostMessage>::new(outbound);
        self.coordinator.connect(host, Arc::new(sink))
    }

    fn spawn_event_forwarder(&self, host: HostId, outbound: HostSender) {
        let mut events = self.registry.subscribe();
        let mut catalog = self.catalog.subscribe();
        let mut catalog_open = true;
        let registry = self.registry.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = outbound.closed() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let Some(message) = HostMessage::from_event(event) else {
                            continue;
                        };
                        if outbound.send(message).is_err() {
                            break;
                        }
                    }
                    change = catalog.recv(), if catalog_open => {
                        let event = match change {
                            Ok(event) => event,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Host {} missed {} catalog changes", host, skipped);
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                catalog_open = false;
                                continue;
                            }
                        };
                        let Some(theme) = event.theme() else { continue };
                        let message = HostMessage::ThemeChanged {
                            theme: theme.to_string(),
                            sessions: sessions_using_theme(&registry, theme),
                        };
                        if outbound.send(message).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Event forwarding to host {} stopped", host);
        });
    }

    /// Answer one request. Fire-and-forget requests reply only on error.
    pub async fn handle(&self, host: HostId, request: HostRequest) -> Option<HostMessage> {
        match request {
            HostRequest::Hello { .. } => Some(HostMessage::error(
                None,
                Error::Protocol {
                    reason: "hello already received".to_string(),
                }
                .to_string(),
            )),
            HostRequest::Create {
                request_id,
                profile,
                theme,
                cwd,
                cols,
                rows,
            } => {
                let mut request = CreateSessionRequest::new();
                request.profile = profile;
                request.theme = theme;
                request.cwd = cwd;
                request.size = self.requested_size(cols, rows);

                Some(match self.create_session(host, request).await {
                    Ok(session) => HostMessage::Created {
                        request_id,
                        session_id: session.id,
                    },
                    Err(e) => HostMessage::Error {
                        request_id,
                        session_id: None,
                        message: e.to_string(),
                    },
                })
            }
            HostRequest::Write { session_id, data } => match self.write(session_id, &data) {
                Ok(()) => None,
                Err(e) => Some(HostMessage::error(Some(session_id), e.to_string())),
            },
            HostRequest::Resize {
                session_id,
                cols,
                rows,
            } => self
                .registry
                .resize(session_id, TerminalSize::new(cols, rows))
                .err()
                .map(|e| HostMessage::error(Some(session_id), e.to_string())),
            HostRequest::Dispose {
                request_id,
                session_id,
            } => {
                let ok = match self.registry.remove_session(session_id) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Dispose of {} failed: {}", session_id, e);
                        false
                    }
                };
                Some(HostMessage::Disposed {
                    request_id,
                    session_id,
                    ok,
                })
            }
            HostRequest::Activate { session_id } => self
                .registry
                .activate_session(session_id)
                .err()
                .map(|e| HostMessage::error(Some(session_id), e.to_string())),
            HostRequest::List => Some(HostMessage::Sessions {
                sessions: self.registry.get_all_sessions(),
            }),
            HostRequest::Split {
                request_id,
                parent_id,
                direction,
            } => Some(match self.split(host, parent_id, direction).await {
                Ok(session_id) => HostMessage::Created {
                    request_id,
                    session_id,
                },
                Err(e) => HostMessage::Error {
                    request_id,
                    session_id: Some(parent_id),
                    message: e.to_string(),
                },
            }),
        }
    }

    fn requested_size(&self, cols: Option<u16>, rows: Option<u16>) -> Option<TerminalSize> {
        if cols.is_none() && rows.is_none() {
            return None;
        }
        let default = self.config.session.size();
        Some(TerminalSize::new(
            cols.unwrap_or(default.cols),
            rows.unwrap_or(default.rows),
        ))
    }

    /// Create a session owned by `host`
    pub async fn create_session(
        &self,
        host: HostId,
        request: CreateSessionRequest,
    ) -> Result<TerminalSession> {
        let session = self.registry.create_session(request).await?;
        self.claim(host, session.id);
        Ok(session)
    }

    /// Split `parent_id`; the new session is owned by `host`
    pub async fn split(
        &self,
        host: HostId,
        parent_id: SessionId,
        direction: SplitDirection,
    ) -> Result<SessionId> {
        let id = self.splits.create_split(parent_id, direction).await?;
        self.claim(host, id);
        Ok(id)
    }

    fn claim(&self, host: HostId, id: SessionId) {
        if let Err(e) = self.coordinator.claim(host, id) {
            // Exited before the host could own it
            debug!("Could not hand session {} to host {}: {}", id, host, e);
        }
    }

    /// Forward input. Terminated processes swallow input silently and
    /// broken pipes surface as a session `error` event.
    pub fn write(&self, id: SessionId, data: &[u8]) -> Result<()> {
        match self.registry.write(id, data) {
            Err(Error::ProcessAlreadyTerminated { .. }) => {
                debug!("Dropping input for terminated session {}", id);
                Ok(())
            }
            Err(Error::WriteFailure { .. }) => Ok(()),
            other => other,
        }
    }

    /// The host's transport closed
    pub fn disconnect(&self, connection: HostConnection) {
        self.coordinator.disconnect(connection);
    }

    /// Kill every session, no grace
    pub fn shutdown(&self) -> usize {
        self.coordinator.shutdown()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ProfileThemeCatalog> {
        &self.catalog
    }

    pub fn history(&self) -> &Arc<HistoryBuffer> {
        &self.history
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<IoBridge> {
        self.registry.bridge()
    }

    pub fn splits(&self) -> &Arc<SplitViewManager> {
        &self.splits
    }

    pub fn coordinator(&self) -> &Arc<HostCoordinator> {
        &self.coordinator
    }
}

fn sessions_using_theme(registry: &SessionRegistry, theme: &str) -> Vec<SessionId> {
    registry
        .get_all_sessions()
        .into_iter()
        .filter(|session| session.theme_name == theme)
        .map(|session| session.id)
        .collect()
}
