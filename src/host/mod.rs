//! UI host side
//!
//! The message protocol, the coordinator tracking host ownership and
//! reconnects, the transport-agnostic service, and the Unix socket server.

pub mod coordinator;
pub mod protocol;
pub mod server;
pub mod service;

pub use coordinator::{HostConnection, HostCoordinator};
pub use protocol::{HostId, HostMessage, HostRequest};
pub use service::{HostSender, TerminalService};
