//! tabmux - terminal session multiplexer
//!
//! Runs one shell process per logical terminal tab, streams its I/O to a
//! UI host across a process boundary, and keeps session state (profiles,
//! themes, split layouts, command history) consistent across host
//! reconnects and process failures.
//!
//! ## Module Organization
//!
//! ### Core
//!
//! - [`catalog`] - Profiles, themes and user custom themes
//! - [`pty`] - Shell processes behind pseudoterminals and their supervisor
//! - [`bridge`] - Output buffering and routing, input forwarding
//! - [`session`] - Session registry, lifecycle events and output pumps
//! - [`split`] - Split view layouts over sessions
//! - [`history`] - Bounded command history
//!
//! ### Host side
//!
//! - [`host`] - Message protocol, reconnect coordinator, service and the
//!   Unix socket server
//!
//! ### Support
//!
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Session and process records
//! - [`platform`] - Platform shell and filesystem lookups
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabmux::{Config, HostRequest, TerminalService};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> tabmux::Result<()> {
//! let service = TerminalService::native(Config::default())?;
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let host = service.hello(None, tx).host;
//!
//! let reply = service
//!     .handle(
//!         host,
//!         HostRequest::Create {
//!             request_id: None,
//!             profile: Some("default".to_string()),
//!             theme: None,
//!             cwd: None,
//!             cols: None,
//!             rows: None,
//!         },
//!     )
//!     .await;
//! println!("{:?}", reply);
//!
//! while let Some(message) = rx.recv().await {
//!     println!("{:?}", message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Reader/Writer Threads:** Blocking pty I/O, one thread per stream
//! - **Pump Tasks:** One tokio task per session moves output into the bridge
//! - **Registry Lock:** A single mutex linearizes create/remove/activate;
//!   output never takes it

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod models;
pub mod platform;
pub mod pty;
pub mod session;
pub mod split;

// Re-exports for core functionality
pub use catalog::{ProfileThemeCatalog, TerminalProfile, TerminalTheme};
pub use config::loader::ConfigLoader;
pub use config::Config;
pub use error::{Error, Result};
pub use host::{
    HostConnection, HostCoordinator, HostId, HostMessage, HostRequest, TerminalService,
};
pub use models::{SessionId, SessionStatus, TerminalSession, TerminalSize};
pub use session::{CreateSessionRequest, SessionEvent, SessionRegistry};
pub use split::{SplitDirection, SplitView, SplitViewManager};

// Version information
/// The current version of tabmux from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The crate name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The crate description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load the configuration.
///
/// An explicit path must load cleanly. Without one, the usual locations are
/// searched and a broken or missing file falls back to defaults.
pub fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    match path {
        Some(path) => loader.load_from_path(path),
        None => match loader.load() {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Failed to load configuration: {}. Using defaults", e);
                Ok(Config::default())
            }
        },
    }
}

/// Human-readable explanation of a startup failure
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => {
            format!(
                "Configuration Error: Failed to load config from '{}': {}\n\nTry:\n• Check the file exists and is readable\n• Run without --config to use defaults",
                path.display(),
                reason
            )
        }
        Error::ConfigParseFailed { format, reason } => {
            format!(
                "Configuration Error: Failed to parse {} config: {}\n\nTry:\n• Check configuration file syntax\n• Ensure file is valid {}",
                format, reason, format
            )
        }
        Error::ConfigValidationFailed { field, reason } => {
            format!(
                "Configuration Error: Validation failed for '{}': {}\n\nTry:\n• Check configuration value",
                field, reason
            )
        }
        Error::Io(err) => {
            format!(
                "I/O Error: {}\n\nTry:\n• Check the socket directory exists and is writable\n• Remove a stale socket left by another instance",
                err
            )
        }
        _ => {
            format!(
                "Unexpected Error: {}\n\nPlease report this issue with debug logs enabled",
                error
            )
        }
    }
}
