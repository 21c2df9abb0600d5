//! Configuration management for Syndicate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Maximum posts a user may have scheduled on one calendar day.
    pub daily_limit: u32,
    /// Total dispatch attempts per (post, platform) pair.
    pub max_attempts: u32,
    /// Delay before attempt 2, attempt 3, and so on. Attempts past the end
    /// of the list reuse the last delay.
    pub backoff_seconds: Vec<i64>,
    /// When false the sweep selects every scheduled post regardless of its
    /// scheduled time (relaxed mode).
    pub enforce_time_filter: bool,
    /// Seconds between sweeps in the daemon.
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            daily_limit: 5,
            max_attempts: 3,
            backoff_seconds: vec![30, 60, 120],
            enforce_time_filter: true,
            poll_interval: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Worker tasks pulling dispatch entries from the queue.
    pub workers: usize,
    /// Simulated publish latency in milliseconds.
    pub latency_ms: u64,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            latency_ms: 1000,
        }
    }
}

/// Sane default pool size: one worker per core, capped at 8.
pub fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 8)
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/syndicate/syndicate.db".to_string(),
            },
            scheduling: SchedulingConfig::default(),
            publishing: PublishingConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICATE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndicate").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("syndicate"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default_config();
        assert_eq!(config.scheduling.daily_limit, 5);
        assert_eq!(config.scheduling.max_attempts, 3);
        assert_eq!(config.scheduling.backoff_seconds, vec![30, 60, 120]);
        assert!(config.scheduling.enforce_time_filter);
        assert_eq!(config.scheduling.poll_interval, 60);
        assert!(config.publishing.workers >= 1);
        assert!(config.publishing.workers <= 8);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [database]
            path = "/tmp/syndicate.db"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, "/tmp/syndicate.db");
        // Sections omitted entirely fall back to defaults
        assert_eq!(config.scheduling.daily_limit, 5);
        assert_eq!(config.publishing.latency_ms, 1000);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            path = "/tmp/syndicate.db"

            [scheduling]
            daily_limit = 10
            max_attempts = 5
            backoff_seconds = [5, 10]
            enforce_time_filter = false
            poll_interval = 15

            [publishing]
            workers = 2
            latency_ms = 50
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduling.daily_limit, 10);
        assert_eq!(config.scheduling.max_attempts, 5);
        assert_eq!(config.scheduling.backoff_seconds, vec![5, 10]);
        assert!(!config.scheduling.enforce_time_filter);
        assert_eq!(config.scheduling.poll_interval, 15);
        assert_eq!(config.publishing.workers, 2);
        assert_eq!(config.publishing.latency_ms, 50);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
            [database]
            path = ":memory:"

            [scheduling]
            daily_limit = 3
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduling.daily_limit, 3);
        assert_eq!(config.scheduling.max_attempts, 3);
        assert_eq!(config.scheduling.backoff_seconds, vec![30, 60, 120]);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result = Config::load_from_path(&PathBuf::from("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_env_override() {
        std::env::set_var("SYNDICATE_CONFIG", "/tmp/custom/config.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom/config.toml"));
        std::env::remove_var("SYNDICATE_CONFIG");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_default_location() {
        std::env::remove_var("SYNDICATE_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("syndicate/config.toml"));
    }
}
