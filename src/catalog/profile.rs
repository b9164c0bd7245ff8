//! Terminal profiles
//!
//! A profile is the recipe for a shell: which executable, which arguments,
//! extra environment and a starting directory. Display hints travel with it
//! for the UI host but have no effect on the process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Cursor shape requested by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Display-only hints forwarded to the UI host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayHints {
    pub font_family: String,
    pub font_size: f32,
    pub cursor_style: CursorStyle,
    pub cursor_blink: bool,
}

impl Default for DisplayHints {
    fn default() -> Self {
        Self {
            font_family: "monospace".to_string(),
            font_size: 13.0,
            cursor_style: CursorStyle::Block,
            cursor_blink: true,
        }
    }
}

/// Named shell launch recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalProfile {
    /// Profile name, unique within the catalog
    pub name: String,

    /// Shell executable; `None` means the platform default shell
    #[serde(default)]
    pub shell: Option<PathBuf>,

    /// Explicit arguments. When empty the supervisor adds the
    /// interactive flags for the detected shell family.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides applied on top of the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Starting directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Start bash/zsh/fish as login shells
    #[serde(default)]
    pub login_shell: bool,

    #[serde(default)]
    pub display: DisplayHints,
}

impl TerminalProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shell: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            login_shell: false,
            display: DisplayHints::default(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn login(mut self, login_shell: bool) -> Self {
        self.login_shell = login_shell;
        self
    }
}
