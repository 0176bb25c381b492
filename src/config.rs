//! Configuration and log location management for ndlog

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Supplies the directory and file the log writer targets
///
/// The writer never chooses paths itself. `log_file()` is expected to live
/// inside `log_dir()`.
pub trait LogPaths {
    /// Directory containing the log file
    fn log_dir(&self) -> PathBuf;

    /// Full path of the log file
    fn log_file(&self) -> PathBuf;
}

/// Log location fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPaths {
    dir: PathBuf,
    file_name: String,
}

impl FixedPaths {
    /// Create paths for `file_name` inside `dir`
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }
}

impl LogPaths for FixedPaths {
    fn log_dir(&self) -> PathBuf {
        self.dir.clone()
    }

    fn log_file(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// File name of the log inside `log_dir`
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    /// Delete the log once it is older than this many days (0 disables rotation)
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Maximum batches queued for the forwarder before senders wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_log_dir() -> PathBuf {
    logs_dir()
}

fn default_log_file_name() -> String {
    "ndlog.log".to_string()
}

fn default_retention_days() -> u64 {
    7
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_file_name: default_log_file_name(),
            retention_days: default_retention_days(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path, or return default if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Retention window for rotation, or `None` when rotation is disabled
    pub fn retention(&self) -> Option<Duration> {
        if self.retention_days == 0 {
            None
        } else {
            Some(Duration::from_secs(self.retention_days * 24 * 60 * 60))
        }
    }

    /// Fix the configured location into a `FixedPaths`
    pub fn paths(&self) -> FixedPaths {
        FixedPaths::new(self.log_dir.clone(), self.log_file_name.clone())
    }
}

impl LogPaths for Config {
    fn log_dir(&self) -> PathBuf {
        self.log_dir.clone()
    }

    fn log_file(&self) -> PathBuf {
        self.log_dir.join(&self.log_file_name)
    }
}

/// Get the base configuration directory (~/.ndlog)
/// Falls back to ./.ndlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".ndlog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ndlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_file_name, "ndlog.log");
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.queue_capacity, 256);
        assert!(config.log_dir.ends_with("logs"));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.retention_days = 3;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.retention_days, 3);
        assert_eq!(parsed.log_file_name, config.log_file_name);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("log_file_name = \"mobile.log\"").unwrap();
        assert_eq!(parsed.log_file_name, "mobile.log");
        assert_eq!(parsed.retention_days, 7);
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "retention_days = \"soon\"").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_retention_disabled_at_zero() {
        let mut config = Config::default();
        assert_eq!(config.retention(), Some(Duration::from_secs(7 * 86_400)));

        config.retention_days = 0;
        assert!(config.retention().is_none());
    }

    #[test]
    fn test_log_paths() {
        let paths = FixedPaths::new("/tmp/ndlog", "app.log");
        assert_eq!(paths.log_dir(), PathBuf::from("/tmp/ndlog"));
        assert_eq!(paths.log_file(), PathBuf::from("/tmp/ndlog/app.log"));

        let mut config = Config::default();
        config.log_dir = PathBuf::from("/var/tmp/logs");
        assert_eq!(config.log_file(), PathBuf::from("/var/tmp/logs/ndlog.log"));
        assert_eq!(config.paths().log_file(), config.log_file());
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".ndlog"));
    }
}
