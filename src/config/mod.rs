//! Configuration management for tabmux
//!
//! The daemon reads one file (TOML or JSON) holding the tunables of each
//! component plus seed profiles and themes that are registered into the
//! catalog at startup. Every section has defaults, so an empty file or no
//! file at all yields a working configuration.

pub mod loader;

pub use loader::{ConfigFormat, ConfigLoader};

use crate::catalog::{ProfileThemeCatalog, TerminalProfile, TerminalTheme};
use crate::catalog::{DEFAULT_PROFILE, DEFAULT_THEME};
use crate::error::{Error, Result};
use crate::models::TerminalSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for tabmux
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session defaults
    pub session: SessionConfig,

    /// Output bridge configuration
    pub bridge: BridgeConfig,

    /// Host reconnection configuration
    pub coordinator: CoordinatorConfig,

    /// Command history configuration
    pub history: HistoryConfig,

    /// Socket server configuration
    pub server: ServerConfig,

    /// Profiles registered into the catalog at startup
    pub profiles: Vec<TerminalProfile>,

    /// Themes registered into the catalog at startup
    pub themes: Vec<TerminalTheme>,
}

/// Defaults applied to session creation requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Profile used when a request names none
    pub default_profile: String,

    /// Theme used when a request names none
    pub default_theme: String,

    /// Initial terminal width
    pub cols: u16,

    /// Initial terminal height
    pub rows: u16,

    /// Keep exited sessions in the registry instead of removing them
    pub retain_exited: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_profile: DEFAULT_PROFILE.to_string(),
            default_theme: DEFAULT_THEME.to_string(),
            cols: 80,
            rows: 24,
            retain_exited: false,
        }
    }
}

impl SessionConfig {
    pub fn size(&self) -> TerminalSize {
        TerminalSize::new(self.cols, self.rows)
    }
}

/// Output bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bytes of undelivered output kept per detached session
    pub buffer_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: crate::bridge::DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Host reconnection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long a disconnected host's sessions survive
    pub grace_period_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Command history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of commands kept
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: crate::history::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Socket server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Unix socket path; `None` uses the runtime directory
    pub socket_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Socket path to bind, falling back to `$XDG_RUNTIME_DIR/tabmux.sock`
    /// or the temp directory
    pub fn resolved_socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tabmux.sock")
        })
    }
}

impl Config {
    /// Reject values the components cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session.cols == 0 || self.session.rows == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "session.cols/rows".to_string(),
                reason: "Terminal size must be greater than 0".to_string(),
            });
        }

        if self.session.default_profile.trim().is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "session.default_profile".to_string(),
                reason: "Profile name cannot be empty".to_string(),
            });
        }

        if self.session.default_theme.trim().is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "session.default_theme".to_string(),
                reason: "Theme name cannot be empty".to_string(),
            });
        }

        if self.bridge.buffer_capacity == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "bridge.buffer_capacity".to_string(),
                reason: "Buffer capacity must be greater than 0".to_string(),
            });
        }

        if self.bridge.buffer_capacity > 64 * 1024 * 1024 {
            return Err(Error::ConfigValidationFailed {
                field: "bridge.buffer_capacity".to_string(),
                reason: "Buffer capacity cannot exceed 64MB".to_string(),
            });
        }

        if self.history.capacity == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "history.capacity".to_string(),
                reason: "History capacity must be greater than 0".to_string(),
            });
        }

        for (index, profile) in self.profiles.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field: format!("profiles[{}].name", index),
                    reason: "Profile name cannot be empty".to_string(),
                });
            }
        }

        for (index, theme) in self.themes.iter().enumerate() {
            if theme.name.trim().is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field: format!("themes[{}].name", index),
                    reason: "Theme name cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Build a catalog holding the defaults plus the configured seeds
    pub fn build_catalog(&self) -> ProfileThemeCatalog {
        let catalog = ProfileThemeCatalog::with_defaults();
        for profile in &self.profiles {
            catalog.register_profile(profile.clone());
        }
        for theme in &self.themes {
            catalog.register_theme(theme.clone());
        }
        info!(
            "Catalog ready: {} profiles, {} themes",
            catalog.profiles().len(),
            catalog.themes().len()
        );
        catalog
    }
}
