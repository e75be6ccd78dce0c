use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::agent::client::{DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use crate::utils::{self, RunMode};

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_discovery_turns")]
    pub max_discovery_turns: usize,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            profile_path: default_profile_path(),
            model: default_model(),
            api_base_url: default_api_base_url(),
            max_discovery_turns: default_max_discovery_turns(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn data_file_for_mode(mode: RunMode, file: &str) -> String {
    if let Some(data_dir) = utils::get_data_dir(mode) {
        data_dir.join(file).to_string_lossy().to_string()
    } else {
        let dir = match mode {
            RunMode::Dev => "~/.compass-dev",
            RunMode::Prod => "~/.compass",
        };
        format!("{}/{}", dir, file)
    }
}

fn default_database_path() -> String {
    data_file_for_mode(RunMode::Prod, "compass.db")
}

fn default_profile_path() -> String {
    data_file_for_mode(RunMode::Prod, "user_profile.json")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_max_discovery_turns() -> usize {
    6
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
    /// Load configuration from the mode's config dir, creating it with
    /// defaults if missing. Data paths always follow the mode.
    pub fn load_with_mode(mode: RunMode) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(mode)?;

        if config_path.exists() {
            let mut config = Self::load_from_path(&config_path)?;
            if mode == RunMode::Dev {
                config.database_path = data_file_for_mode(mode, "compass.db");
                config.profile_path = data_file_for_mode(mode, "user_profile.json");
            }
            Ok(config)
        } else {
            let mut config = Config::default();
            config.database_path = data_file_for_mode(mode, "compass.db");
            config.profile_path = data_file_for_mode(mode, "user_profile.json");
            if let Err(e) = config.save_to_path(&config_path) {
                tracing::error!(path = %config_path.display(), error = %e, "failed to save config file");
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load an explicit config file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(mode: RunMode) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(mode)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn get_profile_path(&self) -> PathBuf {
        utils::expand_path(&self.profile_path)
    }
}
