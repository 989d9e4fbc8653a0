//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/copilot/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/copilot/` (~/.config/copilot/)
//! - Data: `$XDG_DATA_HOME/copilot/` (~/.local/share/copilot/)
//! - State/Logs: `$XDG_STATE_HOME/copilot/` (~/.local/state/copilot/)
//!
//! Editor-facing settings (`llm.providers`, `onboarding.completed`, ...) are
//! not part of this file; they live behind [`crate::settings::Settings`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session model limits
    #[serde(default)]
    pub session: SessionConfig,

    /// LLM call defaults
    #[serde(default)]
    pub llm: LlmConfig,

    /// Cloud sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// OAuth polling configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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

/// Limits applied by the session model services
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Minutes without activity before an active session is considered stale
    #[serde(default = "default_max_inactivity_minutes")]
    pub max_inactivity_minutes: i64,

    /// Prompts kept per session (oldest dropped)
    #[serde(default = "default_history_bound")]
    pub max_prompts: usize,

    /// Responses kept per session (oldest dropped)
    #[serde(default = "default_history_bound")]
    pub max_responses: usize,

    /// Length of `truncatedText` on captured prompts
    #[serde(default = "default_truncate_chars")]
    pub truncate_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactivity_minutes: default_max_inactivity_minutes(),
            max_prompts: default_history_bound(),
            max_responses: default_history_bound(),
            truncate_chars: default_truncate_chars(),
        }
    }
}

fn default_max_inactivity_minutes() -> i64 {
    120
}

fn default_history_bound() -> usize {
    100
}

fn default_truncate_chars() -> usize {
    100
}

/// LLM call defaults (the `llm.timeout` setting overrides the timeout)
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_timeout() -> u64 {
    60
}

/// Cloud sync configuration
///
/// When `server_url` is set the host wires an HTTP cloud client; otherwise
/// sync requests fail softly with an "unavailable" error.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Sync server URL (e.g., `https://sync.example.com`)
    pub server_url: Option<String>,

    /// Sessions per upload (max 100)
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,

    /// Sessions shorter than this are never uploaded
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: i64,

    /// Size estimate used by previews
    #[serde(default = "default_estimated_kb")]
    pub estimated_kb_per_session: u64,

    /// How long a computed sync status stays fresh
    #[serde(default = "default_status_ttl")]
    pub status_ttl_secs: u64,

    /// Delay before the background status pre-cache runs
    #[serde(default = "default_precache_delay")]
    pub precache_delay_secs: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            batch_size: default_sync_batch_size(),
            min_duration_secs: default_min_duration_secs(),
            estimated_kb_per_session: default_estimated_kb(),
            status_ttl_secs: default_status_ttl(),
            precache_delay_secs: default_precache_delay(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl SyncConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(Error::Config(
                "sync.batch_size must be between 1 and 100".to_string(),
            ));
        }
        if self.min_duration_secs < 0 {
            return Err(Error::Config(
                "sync.min_duration_secs must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_sync_batch_size() -> usize {
    100
}

fn default_min_duration_secs() -> i64 {
    240
}

fn default_estimated_kb() -> u64 {
    5
}

fn default_status_ttl() -> u64 {
    60
}

fn default_precache_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

/// OAuth device-login polling
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_timeout() -> u64 {
    300
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.sync.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/copilot/config.toml` (~/.config/copilot/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("copilot").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite store)
    ///
    /// `$XDG_DATA_HOME/copilot/` (~/.local/share/copilot/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("copilot")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/copilot/` (~/.local/state/copilot/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("copilot")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/copilot/store.db` (~/.local/share/copilot/store.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("store.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/copilot/copilot.log` (~/.local/state/copilot/copilot.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("copilot.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.max_inactivity_minutes, 120);
        assert_eq!(config.session.max_prompts, 100);
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.sync.min_duration_secs, 240);
        assert_eq!(config.auth.poll_timeout_secs, 300);
        assert!(config.sync.server_url.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[session]
max_inactivity_minutes = 30

[sync]
server_url = "https://sync.example.com"
batch_size = 50

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.session.max_inactivity_minutes, 30);
        assert_eq!(config.session.max_prompts, 100);
        assert_eq!(
            config.sync.server_url.as_deref(),
            Some("https://sync.example.com")
        );
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_sync_config_validation() {
        assert!(SyncConfig::default().validate().is_ok());

        let config = SyncConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            batch_size: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\ntimeout_secs = 15\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm.timeout_secs, 15);
    }

    #[test]
    fn test_load_rejects_bad_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nbatch_size = 500\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
