//! Profile and theme catalog
//!
//! In-memory registry of the shell profiles and color themes sessions are
//! created from. Registration is last-write-wins and announced on a
//! broadcast channel so a host can refresh its pickers.

pub mod profile;
pub mod theme;

pub use profile::{CursorStyle, DisplayHints, TerminalProfile};
pub use theme::{builtin_themes, Color, TerminalTheme, ThemePalette};

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Name of the profile seeded by [`ProfileThemeCatalog::with_defaults`]
pub const DEFAULT_PROFILE: &str = "default";

/// Name of the theme used when a request names none
pub const DEFAULT_THEME: &str = "default-dark";

/// Catalog change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    ProfileRegistered { name: String },
    ThemeRegistered { name: String },
    CustomThemeRegistered { id: String },
    CustomThemeRemoved { id: String },
}

impl CatalogEvent {
    /// Theme name or custom theme ID whose resolution changed
    pub fn theme(&self) -> Option<&str> {
        match self {
            CatalogEvent::ProfileRegistered { .. } => None,
            CatalogEvent::ThemeRegistered { name } => Some(name),
            CatalogEvent::CustomThemeRegistered { id } | CatalogEvent::CustomThemeRemoved { id } => {
                Some(id)
            }
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    profiles: BTreeMap<String, TerminalProfile>,
    themes: BTreeMap<String, TerminalTheme>,
    custom_themes: BTreeMap<String, TerminalTheme>,
}

/// Registry of profiles, built-in themes and user custom themes
#[derive(Debug)]
pub struct ProfileThemeCatalog {
    state: RwLock<CatalogState>,
    events: broadcast::Sender<CatalogEvent>,
}

impl ProfileThemeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(CatalogState::default()),
            events,
        }
    }

    /// Catalog with the default profile and the built-in themes
    pub fn with_defaults() -> Self {
        let catalog = Self::new();
        catalog.register_profile(TerminalProfile::new(DEFAULT_PROFILE));
        for theme in builtin_themes() {
            catalog.register_theme(theme);
        }
        catalog
    }

    /// Subscribe to catalog changes
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub fn register_profile(&self, profile: TerminalProfile) {
        let name = profile.name.clone();
        self.write_state().profiles.insert(name.clone(), profile);
        debug!("Registered profile '{}'", name);
        self.emit(CatalogEvent::ProfileRegistered { name });
    }

    pub fn get_profile(&self, name: &str) -> Result<TerminalProfile> {
        self.read_state()
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound {
                name: name.to_string(),
            })
    }

    pub fn profiles(&self) -> Vec<TerminalProfile> {
        self.read_state().profiles.values().cloned().collect()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.read_state().profiles.keys().cloned().collect()
    }

    pub fn register_theme(&self, theme: TerminalTheme) {
        let name = theme.name.clone();
        self.write_state().themes.insert(name.clone(), theme);
        debug!("Registered theme '{}'", name);
        self.emit(CatalogEvent::ThemeRegistered { name });
    }

    /// Look up a theme. Custom theme IDs shadow catalog names.
    pub fn get_theme(&self, name: &str) -> Result<TerminalTheme> {
        let state = self.read_state();
        state
            .custom_themes
            .get(name)
            .or_else(|| state.themes.get(name))
            .cloned()
            .ok_or_else(|| Error::ThemeNotFound {
                name: name.to_string(),
            })
    }

    pub fn themes(&self) -> Vec<TerminalTheme> {
        self.read_state().themes.values().cloned().collect()
    }

    pub fn has_theme(&self, name: &str) -> bool {
        let state = self.read_state();
        state.custom_themes.contains_key(name) || state.themes.contains_key(name)
    }

    pub fn register_custom_theme(&self, id: impl Into<String>, theme: TerminalTheme) {
        let id = id.into();
        self.write_state().custom_themes.insert(id.clone(), theme);
        debug!("Registered custom theme '{}'", id);
        self.emit(CatalogEvent::CustomThemeRegistered { id });
    }

    pub fn remove_custom_theme(&self, id: &str) -> Result<TerminalTheme> {
        let removed = self
            .write_state()
            .custom_themes
            .remove(id)
            .ok_or_else(|| Error::ThemeNotFound {
                name: id.to_string(),
            })?;
        self.emit(CatalogEvent::CustomThemeRemoved { id: id.to_string() });
        Ok(removed)
    }

    pub fn custom_themes(&self) -> Vec<(String, TerminalTheme)> {
        self.read_state()
            .custom_themes
            .iter()
            .map(|(id, theme)| (id.clone(), theme.clone()))
            .collect()
    }

    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProfileThemeCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}
