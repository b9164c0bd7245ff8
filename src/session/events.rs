//! Session Event System
//!
//! Typed lifecycle notifications. Events are published while the registry
//! lock is held, so every subscriber sees the events of one session in the
//! order they happened.

use tokio::sync::broadcast;

use crate::models::{ProcessExit, SessionId};

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by the session registry
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Process spawned, session is running
    Created {
        id: SessionId,
        /// Process ID
        pid: Option<u32>,
    },
    /// Spawn failed, the session never ran
    Failed { id: SessionId, reason: String },
    /// Session became the active one
    Activated { id: SessionId },
    /// Tab title changed
    TitleChanged { id: SessionId, title: String },
    /// Process terminated on its own
    Exited { id: SessionId, exit: ProcessExit },
    /// Session-scoped failure (e.g. broken stdin)
    Error { id: SessionId, message: String },
    /// Session record deleted
    Removed { id: SessionId },
}

impl SessionEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::Created { id, .. }
            | SessionEvent::Failed { id, .. }
            | SessionEvent::Activated { id }
            | SessionEvent::TitleChanged { id, .. }
            | SessionEvent::Exited { id, .. }
            | SessionEvent::Error { id, .. }
            | SessionEvent::Removed { id } => *id,
        }
    }
}

/// Subscription handle for receiving session events
#[derive(Debug)]
pub struct SessionEventSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionEventSubscription {
    /// Receive the next event, waiting if necessary. `None` once the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Session event subscriber lagged by {} events", count);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!("Session event subscriber lagged by {} events", count);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Broadcast bus for session events
#[derive(Debug, Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEventBus {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> SessionEventSubscription {
        SessionEventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        // Ignore errors - they just mean no subscribers are active
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Synchronous hooks run as sessions leave the live set
pub trait SessionObserver: Send + Sync {
    fn session_removed(&self, id: SessionId);

    /// The process ended but the record is retained
    fn session_exited(&self, _id: SessionId) {}
}
