//! Configuration File Loading
//!
//! Locates the configuration file, parses it by extension and validates the
//! result. Search order: `$TABMUX_CONFIG`, then `config.toml` / `config.json`
//! under the platform config directory, then built-in defaults.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TABMUX_CONFIG";

/// Configuration file loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directories searched for `config.{toml,json}`
    search_paths: Vec<PathBuf>,
    /// Path the last configuration was loaded from
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Format from a file extension; unknown extensions read as TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
            current_path: None,
        }
    }

    /// Create a loader over explicit directories
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            current_path: None,
        }
    }

    /// Load configuration from `$TABMUX_CONFIG`, the search paths, or defaults
    pub fn load(&mut self) -> Result<Config> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
            return self.load_from_path(Path::new(&path));
        }

        if let Some((path, config)) = self.find_and_load_config() {
            config.validate()?;
            info!("Loaded configuration from {}", path.display());
            self.current_path = Some(path);
            return Ok(config);
        }

        debug!("No configuration file found, using defaults");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a specific file. Errors are not swallowed.
    pub fn load_from_path(&mut self, path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(Error::ConfigLoadFailed {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let config = Self::load_config_file(path, ConfigFormat::from_path(path))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        self.current_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// First parseable config file in the search paths
    fn find_and_load_config(&self) -> Option<(PathBuf, Config)> {
        for dir in &self.search_paths {
            for format in [ConfigFormat::Toml, ConfigFormat::Json] {
                let path = dir.join("config").with_extension(format.extension());
                if !path.exists() {
                    continue;
                }

                match Self::load_config_file(&path, format) {
                    Ok(config) => return Some((path, config)),
                    Err(e) => {
                        // Keep searching
                        warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        None
    }

    /// Parse a configuration file
    pub fn load_config_file(path: &Path, format: ConfigFormat) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::parse(&content, format)
    }

    /// Parse configuration text
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Config> {
        let parse_error = |reason: String| Error::ConfigParseFailed {
            format: format.label().to_string(),
            reason,
        };

        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
        }
    }

    /// Default search paths for configuration files
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tabmux"));
        }

        // Home directory fallback
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tabmux"));
        }

        paths
    }

    /// Get the current configuration file path
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
