//! Configuration management for attio-universal
//!
//! This module provides centralized configuration with environment variable
//! support, an optional YAML file and sensible defaults for the metadata
//! cache, the batch executor and search paging.

use crate::common::env_loader::EnvLoader;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional YAML configuration file
pub const CONFIG_FILE_NAME: &str = "attio-universal.yaml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ATTIO_UNIVERSAL";

/// Default metadata cache lifetime in seconds
pub const DEFAULT_METADATA_CACHE_TTL_SECONDS: u64 = 300;

/// Default number of cached attribute schemas
pub const DEFAULT_METADATA_CACHE_MAX_SIZE: usize = 256;

/// Default ceiling on items per batch call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default number of operations dispatched concurrently per chunk
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Default pause between chunks in milliseconds
pub const DEFAULT_BATCH_DELAY_MS: u64 = 100;

/// Default page size for search when the caller gives none
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Largest page size a search may request
pub const DEFAULT_SEARCH_MAX_LIMIT: usize = 100;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        /// Path to the configuration file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML content from a configuration file
    #[error("Invalid YAML syntax in {path}:\n{source}\n\nHint: Check for proper indentation and YAML formatting")]
    YamlParse {
        /// Path to the configuration file with invalid YAML content
        path: PathBuf,
        /// Underlying YAML parsing error
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value for a specific field
    #[error("Invalid configuration value for '{field}': {value}\n{hint}")]
    InvalidValue {
        /// Name of the configuration field
        field: String,
        /// The rejected value
        value: String,
        /// How to fix it
        hint: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// Descriptive message about the validation failure
        message: String,
    },
}

/// Configuration settings for attio-universal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Lifetime of cached attribute metadata in seconds (default: 300)
    pub metadata_cache_ttl_seconds: u64,
    /// Maximum number of cached attribute schemas (default: 256)
    pub metadata_cache_max_size: usize,
    /// Maximum number of items accepted by one batch call (default: 100)
    pub max_batch_size: usize,
    /// Operations dispatched concurrently within a chunk (default: 5)
    pub batch_concurrency: usize,
    /// Pause between chunks in milliseconds (default: 100)
    pub batch_delay_ms: u64,
    /// Search page size used when none is given (default: 20)
    pub search_default_limit: usize,
    /// Largest search page size (default: 100)
    pub search_max_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_cache_ttl_seconds: DEFAULT_METADATA_CACHE_TTL_SECONDS,
            metadata_cache_max_size: DEFAULT_METADATA_CACHE_MAX_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            search_default_limit: DEFAULT_SEARCH_LIMIT,
            search_max_limit: DEFAULT_SEARCH_MAX_LIMIT,
        }
    }
}

impl Config {
    /// Create a new configuration instance with values loaded from:
    /// 1. YAML file (highest precedence)
    /// 2. Environment variables
    /// 3. Defaults (lowest precedence)
    ///
    /// An invalid result falls back to the defaults with a warning.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();

        match YamlConfig::load_or_default() {
            Ok(yaml_config) => {
                yaml_config.apply_to_config(&mut config);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load YAML configuration, falling back to env vars and defaults: {}",
                    e
                );
            }
        }

        if let Err(e) = config.validate() {
            tracing::warn!("{}. Using default configuration.", e);
            return Self::default();
        }

        config
    }

    /// Apply environment variable configuration to this config
    fn apply_env_vars(&mut self) {
        let loader = EnvLoader::new(ENV_PREFIX);

        self.metadata_cache_ttl_seconds =
            loader.load_parsed("METADATA_CACHE_TTL_SECONDS", self.metadata_cache_ttl_seconds);
        self.metadata_cache_max_size =
            loader.load_parsed("METADATA_CACHE_MAX_SIZE", self.metadata_cache_max_size);
        self.max_batch_size = loader.load_parsed("MAX_BATCH_SIZE", self.max_batch_size);
        self.batch_concurrency = loader.load_parsed("BATCH_CONCURRENCY", self.batch_concurrency);
        self.batch_delay_ms = loader.load_parsed("BATCH_DELAY_MS", self.batch_delay_ms);
        self.search_default_limit =
            loader.load_parsed("SEARCH_DEFAULT_LIMIT", self.search_default_limit);
        self.search_max_limit = loader.load_parsed("SEARCH_MAX_LIMIT", self.search_max_limit);
    }

    /// Get the global configuration instance
    pub fn global() -> &'static Self {
        static CONFIG: std::sync::OnceLock<Config> = std::sync::OnceLock::new();
        CONFIG.get_or_init(Config::new)
    }

    /// Find the configuration file in multiple locations
    ///
    /// The search order is:
    /// 1. Current working directory: `attio-universal.yaml`
    /// 2. `~/.config/attio-universal/attio-universal.yaml`
    /// 3. `~/attio-universal.yaml`
    pub fn find_yaml_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

        if let Some(home_dir) = dirs::home_dir() {
            search_paths.push(
                home_dir
                    .join(".config")
                    .join("attio-universal")
                    .join(CONFIG_FILE_NAME),
            );
            search_paths.push(home_dir.join(CONFIG_FILE_NAME));
        }

        for config_path in search_paths {
            if let Some(path) = Self::check_config_file(&config_path) {
                tracing::debug!("Found configuration file: {:?}", path);
                return Some(path);
            }
        }

        tracing::debug!("No {} configuration file found in any search location", CONFIG_FILE_NAME);
        None
    }

    /// Check if a configuration file exists and is readable
    pub fn check_config_file(config_path: &Path) -> Option<PathBuf> {
        match config_path.try_exists() {
            Ok(true) if config_path.is_file() => match std::fs::File::open(config_path) {
                Ok(_) => Some(config_path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(
                        "Configuration file {:?} exists but cannot be read: {}",
                        config_path,
                        e
                    );
                    None
                }
            },
            Ok(false) => None,
            Ok(true) => {
                tracing::debug!(
                    "Found {:?} but it is not a file (possibly a directory)",
                    config_path
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Error checking for configuration file {:?}: {}",
                    config_path,
                    e
                );
                None
            }
        }
    }

    /// Validate the current configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metadata_cache_ttl_seconds".to_string(),
                value: "0".to_string(),
                hint: "Cache lifetime must be at least one second".to_string(),
            });
        }

        if self.metadata_cache_max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metadata_cache_max_size".to_string(),
                value: "0".to_string(),
                hint: "The cache must hold at least one schema".to_string(),
            });
        }

        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_batch_size".to_string(),
                value: "0".to_string(),
                hint: "Batches must accept at least one item".to_string(),
            });
        }

        if self.batch_concurrency == 0 || self.batch_concurrency > self.max_batch_size {
            return Err(ConfigError::InvalidValue {
                field: "batch_concurrency".to_string(),
                value: self.batch_concurrency.to_string(),
                hint: format!(
                    "Concurrency must be between 1 and max_batch_size ({})",
                    self.max_batch_size
                ),
            });
        }

        if self.search_max_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search_max_limit".to_string(),
                value: "0".to_string(),
                hint: "Searches must be allowed to return at least one record".to_string(),
            });
        }

        if self.search_default_limit == 0 || self.search_default_limit > self.search_max_limit {
            return Err(ConfigError::Validation {
                message: format!(
                    "search_default_limit ({}) must be between 1 and search_max_limit ({})",
                    self.search_default_limit, self.search_max_limit
                ),
            });
        }

        Ok(())
    }
}

/// Configuration loaded from `attio-universal.yaml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    /// Metadata cache lifetime in seconds
    pub metadata_cache_ttl_seconds: Option<u64>,
    /// Metadata cache capacity
    pub metadata_cache_max_size: Option<usize>,
    /// Batch size ceiling
    pub max_batch_size: Option<usize>,
    /// Chunk width
    pub batch_concurrency: Option<usize>,
    /// Pause between chunks in milliseconds
    pub batch_delay_ms: Option<u64>,
    /// Default search page size
    pub search_default_limit: Option<usize>,
    /// Maximum search page size
    pub search_max_limit: Option<usize>,
}

impl YamlConfig {
    /// Apply YAML configuration values to an existing Config
    /// YAML values take precedence over existing values
    pub fn apply_to_config(&self, config: &mut Config) {
        if let Some(ttl) = self.metadata_cache_ttl_seconds {
            config.metadata_cache_ttl_seconds = ttl;
        }
        if let Some(size) = self.metadata_cache_max_size {
            config.metadata_cache_max_size = size;
        }
        if let Some(max) = self.max_batch_size {
            config.max_batch_size = max;
        }
        if let Some(concurrency) = self.batch_concurrency {
            config.batch_concurrency = concurrency;
        }
        if let Some(delay) = self.batch_delay_ms {
            config.batch_delay_ms = delay;
        }
        if let Some(limit) = self.search_default_limit {
            config.search_default_limit = limit;
        }
        if let Some(limit) = self.search_max_limit {
            config.search_max_limit = limit;
        }
    }

    /// Load YAML configuration from a file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("Loading YAML configuration from: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        // An empty document deserializes as unit, not as an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: YamlConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::debug!("Loaded YAML configuration: {:?}", config);
        Ok(config)
    }

    /// Try to load YAML configuration, returning default if file not found
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Config::find_yaml_config_file() {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
