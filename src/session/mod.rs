//! Session management
//!
//! The registry owns session records and their lifecycle; the pump moves
//! output from each process into the I/O bridge.

pub mod events;
mod pump;
pub mod registry;

pub use events::{
    SessionEvent, SessionEventBus, SessionEventSubscription, SessionObserver,
    DEFAULT_EVENT_CAPACITY,
};
pub use registry::{CreateSessionRequest, RegistryOptions, SessionRegistry};
