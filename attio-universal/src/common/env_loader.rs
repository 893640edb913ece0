//! Environment variable loading utilities
//!
//! Typed lookups with fallback defaults, used by [`crate::config::Config`]
//! to layer `ATTIO_UNIVERSAL_*` overrides on top of the built-in defaults.

use std::env;
use std::str::FromStr;

/// Load an environment variable with type conversion and default
///
/// Values that fail to parse are logged and ignored.
pub fn load_env_parsed<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable value '{}' for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

/// Builder for loading multiple environment variables with consistent prefix
#[derive(Debug)]
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a new environment loader with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// Load a parsed value with default
    pub fn load_parsed<T>(&self, suffix: &str, default: T) -> T
    where
        T: FromStr,
    {
        load_env_parsed(&self.key(suffix), default)
    }
}
