//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/rubric/config.toml` and resolved
//! once at startup; components receive the resolved values through their
//! constructors rather than reading the environment themselves.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/rubric/` (~/.config/rubric/)
//! - Data: `$XDG_DATA_HOME/rubric/` (~/.local/share/rubric/)
//! - State/Logs: `$XDG_STATE_HOME/rubric/` (~/.local/state/rubric/)

use crate::error::{Error, Result};
use crate::types::RuleDefinition;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Watch and scan configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Score store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional replacement for the built-in rule catalog
    #[serde(default)]
    pub rules: Option<Vec<RuleDefinition>>,
}

/// Watch and scan configuration
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Root directory holding session transcripts.
    /// Defaults to ~/.codex/sessions when unset.
    pub sessions_dir: Option<PathBuf>,

    /// Quiet period after a filesystem notification before the file is read,
    /// letting the writing process finish its line
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sessions_dir: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Score store configuration
#[derive(Debug, Deserialize, Default)]
pub struct StoreConfig {
    /// Path of the score report document.
    /// Defaults to $XDG_DATA_HOME/rubric/scores.json when unset.
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Root directory to scan and watch, after applying the default.
    pub fn sessions_dir(&self) -> PathBuf {
        self.watch
            .sessions_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".codex/sessions"))
    }

    /// Score report path, after applying the default.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("scores.json"))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/rubric/config.toml` (~/.config/rubric/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("rubric").join("config.toml")
    }

    /// Returns the data directory path (for the score report)
    ///
    /// `$XDG_DATA_HOME/rubric/` (~/.local/share/rubric/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("rubric")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/rubric/` (~/.local/state/rubric/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("rubric")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/rubric/rubric.log` (~/.local/state/rubric/rubric.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("rubric.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
