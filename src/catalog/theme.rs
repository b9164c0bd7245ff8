//! Terminal color themes
//!
//! Named palettes handed to the UI host alongside each session. The core
//! never renders anything; it only validates and stores the colors.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 24-bit RGB color, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` hex string
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor {
            value: value.to_string(),
        };

        let hex = value.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Self::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl std::str::FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.hex()
    }
}

/// The sixteen ANSI slots plus the four terminal chrome colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePalette {
    pub background: Color,
    pub foreground: Color,
    pub cursor: Color,
    pub selection: Color,

    pub black: Color,
    pub red: Color,
    pub green: Color,
    pub yellow: Color,
    pub blue: Color,
    pub magenta: Color,
    pub cyan: Color,
    pub white: Color,
    pub bright_black: Color,
    pub bright_red: Color,
    pub bright_green: Color,
    pub bright_yellow: Color,
    pub bright_blue: Color,
    pub bright_magenta: Color,
    pub bright_cyan: Color,
    pub bright_white: Color,
}

impl ThemePalette {
    /// ANSI slots in escape-code order (30-37, then 90-97)
    pub fn ansi(&self) -> [Color; 16] {
        [
            self.black,
            self.red,
            self.green,
            self.yellow,
            self.blue,
            self.magenta,
            self.cyan,
            self.white,
            self.bright_black,
            self.bright_red,
            self.bright_green,
            self.bright_yellow,
            self.bright_blue,
            self.bright_magenta,
            self.bright_cyan,
            self.bright_white,
        ]
    }
}

/// A named terminal theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalTheme {
    /// Theme name
    pub name: String,
    /// Theme description
    #[serde(default)]
    pub description: String,
    /// Color palette
    pub palette: ThemePalette,
}

impl TerminalTheme {
    pub fn new(name: impl Into<String>, palette: ThemePalette) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            palette,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Themes shipped with the crate
pub fn builtin_themes() -> Vec<TerminalTheme> {
    vec![
        create_dark_theme(),
        create_light_theme(),
        create_solarized_dark_theme(),
    ]
}

fn create_dark_theme() -> TerminalTheme {
    TerminalTheme::new(
        "default-dark",
        ThemePalette {
            background: Color::from_rgb(30, 30, 30),
            foreground: Color::from_rgb(212, 212, 212),
            cursor: Color::from_rgb(174, 175, 173),
            selection: Color::from_rgb(38, 79, 120),
            black: Color::from_rgb(0, 0, 0),
            red: Color::from_rgb(205, 49, 49),
            green: Color::from_rgb(13, 188, 121),
            yellow: Color::from_rgb(229, 229, 16),
            blue: Color::from_rgb(36, 114, 200),
            magenta: Color::from_rgb(188, 63, 188),
            cyan: Color::from_rgb(17, 168, 205),
            white: Color::from_rgb(229, 229, 229),
            bright_black: Color::from_rgb(102, 102, 102),
            bright_red: Color::from_rgb(241, 76, 76),
            bright_green: Color::from_rgb(35, 209, 139),
            bright_yellow: Color::from_rgb(245, 245, 67),
            bright_blue: Color::from_rgb(59, 142, 234),
            bright_magenta: Color::from_rgb(214, 112, 214),
            bright_cyan: Color::from_rgb(41, 184, 219),
            bright_white: Color::from_rgb(255, 255, 255),
        },
    )
    .with_description("Default dark theme")
}

fn create_light_theme() -> TerminalTheme {
    TerminalTheme::new(
        "default-light",
        ThemePalette {
            background: Color::from_rgb(255, 255, 255),
            foreground: Color::from_rgb(36, 36, 36),
            cursor: Color::from_rgb(0, 0, 0),
            selection: Color::from_rgb(173, 214, 255),
            black: Color::from_rgb(0, 0, 0),
            red: Color::from_rgb(195, 39, 43),
            green: Color::from_rgb(40, 174, 96),
            yellow: Color::from_rgb(224, 147, 0),
            blue: Color::from_rgb(66, 113, 174),
            magenta: Color::from_rgb(170, 60, 135),
            cyan: Color::from_rgb(0, 163, 181),
            white: Color::from_rgb(36, 36, 36),
            bright_black: Color::from_rgb(102, 102, 102),
            bright_red: Color::from_rgb(237, 85, 59),
            bright_green: Color::from_rgb(0, 188, 120),
            bright_yellow: Color::from_rgb(244, 191, 117),
            bright_blue: Color::from_rgb(59, 142, 234),
            bright_magenta: Color::from_rgb(214, 112, 214),
            bright_cyan: Color::from_rgb(41, 184, 219),
            bright_white: Color::from_rgb(0, 0, 0),
        },
    )
    .with_description("Default light theme")
}

fn create_solarized_dark_theme() -> TerminalTheme {
    TerminalTheme::new(
        "solarized-dark",
        ThemePalette {
            background: Color::from_rgb(0, 43, 54),
            foreground: Color::from_rgb(131, 148, 150),
            cursor: Color::from_rgb(147, 161, 161),
            selection: Color::from_rgb(7, 54, 66),
            black: Color::from_rgb(7, 54, 66),
            red: Color::from_rgb(220, 50, 47),
            green: Color::from_rgb(133, 153, 0),
            yellow: Color::from_rgb(181, 137, 0),
            blue: Color::from_rgb(38, 139, 210),
            magenta: Color::from_rgb(211, 54, 130),
            cyan: Color::from_rgb(42, 161, 152),
            white: Color::from_rgb(238, 232, 213),
            bright_black: Color::from_rgb(0, 43, 54),
            bright_red: Color::from_rgb(203, 75, 22),
            bright_green: Color::from_rgb(88, 110, 117),
            bright_yellow: Color::from_rgb(101, 123, 131),
            bright_blue: Color::from_rgb(131, 148, 150),
            bright_magenta: Color::from_rgb(108, 113, 196),
            bright_cyan: Color::from_rgb(147, 161, 161),
            bright_white: Color::from_rgb(253, 246, 227),
        },
    )
    .with_description("Solarized dark")
}
