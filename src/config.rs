use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{DEFAULT_FREQUENCY_DAYS, DEFAULT_REMINDER_TIME, EngineOptions};
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Empty means the profile's default location.
    #[serde(default)]
    pub database_path: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_frequency_days")]
    pub default_frequency_days: u32,
    #[serde(default = "default_reminder_time")]
    pub default_reminder_time: String,
    #[serde(default)]
    pub strict_frequency: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            default_frequency_days: default_frequency_days(),
            default_reminder_time: default_reminder_time(),
            strict_frequency: false,
            history_limit: default_history_limit(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_poll_interval_secs() -> u64 {
    60
}

fn default_frequency_days() -> u32 {
    DEFAULT_FREQUENCY_DAYS.get()
}

fn default_reminder_time() -> String {
    DEFAULT_REMINDER_TIME.to_string()
}

fn default_history_limit() -> usize {
    20
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from the profile's config file, or create default if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path, profile)
    }

    /// Load configuration from an explicit path, creating it with defaults if missing.
    /// The profile only decides the default database location.
    pub fn load_from_path(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(format!("{}: {}", config_path.display(), e)))?;
            toml::from_str(&contents)?
        } else {
            let mut config = Config::default();
            config.save_to_path(config_path)?;
            info!("Created default config at {}", config_path.display());
            config
        };

        if config.database_path.is_empty() {
            config.database_path = Self::default_database_path_for_profile(profile);
        }

        Ok(config)
    }

    /// Save configuration to the profile's config file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("botanica.db").to_string_lossy().to_string()
        } else {
            #[cfg(target_os = "macos")]
            {
                match profile {
                    utils::Profile::Dev => "~/Library/Application Support/botanica-dev/botanica.db".to_string(),
                    utils::Profile::Prod => "~/Library/Application Support/botanica/botanica.db".to_string(),
                }
            }
            #[cfg(not(target_os = "macos"))]
            {
                match profile {
                    utils::Profile::Dev => "~/.local/share/botanica-dev/botanica.db".to_string(),
                    utils::Profile::Prod => "~/.local/share/botanica/botanica.db".to_string(),
                }
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Engine options from this config. A zero default frequency falls back
    /// to the built-in default.
    pub fn engine_options(&self) -> EngineOptions {
        let default_frequency_days = NonZeroU32::new(self.default_frequency_days).unwrap_or_else(|| {
            warn!("default_frequency_days must be at least 1, using {}", DEFAULT_FREQUENCY_DAYS);
            DEFAULT_FREQUENCY_DAYS
        });
        let default_reminder_time = utils::parse_reminder_time(&self.default_reminder_time).unwrap_or_else(|_| {
            warn!(
                "Invalid default_reminder_time '{}', using {}",
                self.default_reminder_time, DEFAULT_REMINDER_TIME
            );
            DEFAULT_REMINDER_TIME.to_string()
        });

        EngineOptions {
            default_frequency_days,
            default_reminder_time,
            strict_frequency: self.strict_frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Profile;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let config = Config::load_from_path(&path, Profile::Dev).unwrap();
        assert!(path.exists());
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.default_frequency_days, 7);
        assert_eq!(config.default_reminder_time, "09:00");
        assert_eq!(config.history_limit, 20);
        assert!(!config.strict_frequency);
        assert!(!config.database_path.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "database_path = \"/tmp/plants.db\"\nstrict_frequency = true\n").unwrap();

        let config = Config::load_from_path(&path, Profile::Prod).unwrap();
        assert_eq!(config.get_database_path(), PathBuf::from("/tmp/plants.db"));
        assert!(config.strict_frequency);
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();

        assert!(matches!(
            Config::load_from_path(&path, Profile::Prod),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_engine_options_fall_back_on_bad_values() {
        let config = Config {
            default_frequency_days: 0,
            default_reminder_time: "noonish".to_string(),
            strict_frequency: true,
            ..Config::default()
        };
        let options = config.engine_options();
        assert_eq!(options.default_frequency_days, DEFAULT_FREQUENCY_DAYS);
        assert_eq!(options.default_reminder_time, "09:00");
        assert!(options.strict_frequency);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
