//! Quill configuration system
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. --config <PATH>
//! 3. User-level (~/.config/quill/config.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use quill::util::config::{load_user_config, UserConfig};
//!
//! // Missing file means defaults
//! let config: UserConfig = load_user_config().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::logger::LogLevel;

/// User-level configuration for Quill
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
    /// Batch run settings
    #[serde(default)]
    pub run: RunConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// REPL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Prompt shown when no `prompt` binding overrides it
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Prompt shown while a statement is being continued
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
    /// History file path
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Enable VI mode
    #[serde(default)]
    pub vi_mode: bool,
    /// Colored diagnostics
    #[serde(default = "default_colors")]
    pub colors: bool,
}

fn default_prompt() -> String {
    "> ".to_string()
}

fn default_continuation_prompt() -> String {
    ".. ".to_string()
}

fn default_history_size() -> usize {
    1000
}

fn default_colors() -> bool {
    true
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            continuation_prompt: default_continuation_prompt(),
            history_file: None,
            history_size: default_history_size(),
            vi_mode: false,
            colors: default_colors(),
        }
    }
}

/// Diagnostic output format for batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticFormat {
    #[default]
    Text,
    Json,
}

/// Batch run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// How diagnostics are written to stderr
    #[serde(default)]
    pub diagnostics: DiagnosticFormat,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// Log file, required for logging while the playground owns the terminal
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("quill"));
    }

    // Fallback to ~/.config/quill
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("quill"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("quill"));
    }

    None
}

/// Get the user config file path (~/.config/quill/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(UserConfig::default()),
    }
}

/// Load configuration from an explicit path; the file must exist
pub fn load_config_from(path: &Path) -> Result<UserConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[source] std::io::Error),
    #[error("Config parse error: {0}")]
    ParseError(#[source] toml::de::Error),
}
