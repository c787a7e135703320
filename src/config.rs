//! `tierkv` configuration.
//!
//! Loads a single YAML config file grouped into sections, following the
//! original `LRUdb` prototype's `configs/config.py` / `utilities.load_yaml`,
//! layered with environment-variable overrides via `figment`.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (constructor arguments)
//! 2. Environment variables (`TIERKV_*`)
//! 3. Configuration file (`tierkv.yaml`)
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// `Application` section. Belongs to external collaborators;
/// accepted so a full config file round-trips, but never read by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Free-form name of the embedding application.
    pub name: String,
}

/// `LRU` section — Recency Index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LruConfig {
    /// RI capacity.
    pub maxlen: usize,
    /// Proportion of RI evicted per sync, clamped to `[0.0, 1.0]`.
    pub sync_fraction: f64,
}

impl Default for LruConfig {
    fn default() -> Self {
        Self {
            maxlen: 500,
            sync_fraction: 0.5,
        }
    }
}

/// `LRU_db` / `DataBase` section — Backing Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory containing the collection's durable file.
    pub path: String,
    /// Name of the SQL table backing the collection.
    pub table_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./tierkv_data".to_string(),
            table_name: "store".to_string(),
        }
    }
}

/// `main` section — Composite Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Text-to-bytes codec for keys. Only `"utf-8"` is currently supported.
    pub keyencoding: String,
    /// Value serializer selector. Only `"bincode"` is currently supported.
    pub serialization: String,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            keyencoding: "utf-8".to_string(),
            serialization: "bincode".to_string(),
        }
    }
}

/// Full `tierkv` configuration, one section per table in the YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External-collaborator section, carried but unused by this crate.
    #[serde(rename = "Application")]
    pub application: ApplicationConfig,
    /// Recency Index configuration.
    #[serde(rename = "LRU")]
    pub lru: LruConfig,
    /// Backing Store configuration.
    #[serde(alias = "LRU_db", rename = "DataBase")]
    pub database: DatabaseConfig,
    /// Composite Store configuration.
    pub main: MainConfig,
}

impl Config {
    /// Loads configuration from `tierkv.yaml` in the current directory,
    /// layered with `TIERKV_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("tierkv.yaml")
    }

    /// Loads configuration from a specific YAML file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file fails to parse.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("TIERKV_").split("_").lowercase(false));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Builds a configuration from a YAML string (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::string(yaml));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration, clamping `sync_fraction` and rejecting
    /// a zero-capacity cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `maxlen` is zero.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.lru.maxlen == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LRU.maxlen".to_string(),
                message: "maxlen must be greater than 0".to_string(),
            });
        }
        self.lru.sync_fraction = self.lru.sync_fraction.clamp(0.0, 1.0);
        Ok(())
    }
}
