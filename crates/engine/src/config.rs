//! Configuration via `stratamodel.toml`
//!
//! Every setting has a default, so an empty file is valid. On first use a
//! commented default file can be written next to the application; edit it
//! and restart to change settings.

use crate::pool::CollectionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_model_core::codec::{get_fallback, Fallback};
use strata_model_core::StoreError;
use strata_model_storage::RedisSettings;
use thiserror::Error;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "stratamodel.toml";

/// Errors loading or applying configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// TOML error
        source: toml::de::Error,
    },

    /// The file could not be written
    #[error("Failed to write config file '{}': {source}", path.display())]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is syntactically valid but not accepted
    #[error("Invalid config value: {0}")]
    Invalid(String),

    /// The backend rejected the store settings
    #[error("Invalid store settings: {0}")]
    Backend(#[from] StoreError),
}

/// Backing-store connection settings (`[store]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Connect timeout in milliseconds; must be positive
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Idle connections kept by the pool
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

fn default_url() -> String {
    strata_model_storage::redis_backend::DEFAULT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_idle() -> usize {
    strata_model_storage::DEFAULT_MAX_IDLE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            max_idle: default_max_idle(),
        }
    }
}

/// Defaults applied to registered collections (`[collections]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Fallback codec: `"msgpack"` or `"json"`
    #[serde(default = "default_fallback")]
    pub fallback: String,
    /// Maintain the `{collection}:all` membership set
    #[serde(default = "default_index")]
    pub index: bool,
}

fn default_fallback() -> String {
    "msgpack".to_string()
}

fn default_index() -> bool {
    true
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            index: default_index(),
        }
    }
}

/// Configuration loaded from `stratamodel.toml`
///
/// # Example
///
/// ```toml
/// [store]
/// url = "redis://127.0.0.1:6379/0"
/// max_idle = 8
///
/// [collections]
/// fallback = "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Collection defaults
    #[serde(default)]
    pub collections: CollectionsConfig,
}

impl ModelConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# stratamodel configuration

[store]
# Redis server URL
url = "redis://127.0.0.1:6379/0"
# Timeouts in milliseconds; 0 disables the read/write timeout.
# The connect timeout must be positive.
connect_timeout_ms = 5000
read_timeout_ms = 5000
write_timeout_ms = 5000
# Idle connections kept by the pool
max_idle = 8

[collections]
# Codec for fields without a native representation: "msgpack" or "json"
fallback = "msgpack"
# Maintain the {collection}:all membership set.
# find_all, count and delete_all need it.
index = true
"#
    }

    /// Parse the fallback codec id.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` if the id is not a known codec.
    pub fn fallback(&self) -> Result<Fallback, ConfigError> {
        get_fallback(&self.collections.fallback).map_err(|e| {
            ConfigError::Invalid(format!("collections.fallback: {e}"))
        })
    }

    /// Check values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` for an unknown fallback codec or a zero
    /// connect timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fallback()?;
        if self.store.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.connect_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Collection defaults described by this configuration
    pub fn collection_options(&self) -> Result<CollectionOptions, ConfigError> {
        Ok(CollectionOptions::default()
            .with_fallback(self.fallback()?)
            .with_index(self.collections.index))
    }

    /// Redis connection settings described by this configuration
    pub fn to_settings(&self) -> RedisSettings {
        let optional = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        RedisSettings {
            url: self.store.url.clone(),
            connect_timeout: Duration::from_millis(self.store.connect_timeout_ms),
            read_timeout: optional(self.store.read_timeout_ms),
            write_timeout: optional(self.store.write_timeout_ms),
        }
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`ModelConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ModelConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ModelConfig::default();
        assert_eq!(config.store.url, "redis://127.0.0.1:6379/0");
        assert_eq!(config.store.max_idle, 8);
        assert_eq!(config.fallback().unwrap(), Fallback::MessagePack);
        assert!(config.collections.index);
    }

    #[test]
    fn empty_file_is_valid() {
        let config: ModelConfig = toml::from_str("").unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: ModelConfig = toml::from_str(ModelConfig::default_toml()).unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn parse_partial_sections() {
        let config: ModelConfig = toml::from_str(
            "[collections]\nfallback = \"json\"\nindex = false\n\n[store]\nmax_idle = 2\n",
        )
        .unwrap();
        assert_eq!(config.fallback().unwrap(), Fallback::Json);
        assert_eq!(config.store.max_idle, 2);
        assert_eq!(config.store.read_timeout_ms, 5000);
        let options = config.collection_options().unwrap();
        assert!(!options.index);
        assert_eq!(options.fallback, Fallback::Json);
    }

    #[test]
    fn unknown_fallback_returns_error() {
        let config: ModelConfig = toml::from_str("[collections]\nfallback = \"xml\"").unwrap();
        assert!(matches!(config.fallback(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[store]\nconnect_timeout_ms = 0\n").unwrap();
        assert!(matches!(
            ModelConfig::from_file(&path),
            Err(ConfigError::Invalid(ref msg)) if msg.contains("connect_timeout_ms")
        ));

        let mut config = ModelConfig::default();
        config.store.connect_timeout_ms = 0;
        assert!(config.validate().is_err());
        assert!(matches!(
            crate::Pool::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_timeouts_disable() {
        let mut config = ModelConfig::default();
        config.store.read_timeout_ms = 0;
        let settings = config.to_settings();
        assert_eq!(settings.read_timeout, None);
        assert_eq!(settings.write_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(settings.connect_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        ModelConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = ModelConfig::from_file(&path).unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[collections]\nfallback = \"json\"\n").unwrap();

        ModelConfig::write_default_if_missing(&path).unwrap();
        let config = ModelConfig::from_file(&path).unwrap();
        assert_eq!(config.collections.fallback, "json");
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = ModelConfig::default();
        config.store.url = "redis://cache:6380/2".to_string();
        config.collections.index = false;

        config.write_to_file(&path).unwrap();
        assert_eq!(ModelConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[store\nurl = ").unwrap();
        assert!(matches!(
            ModelConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ModelConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
