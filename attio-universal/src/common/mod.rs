//! Common utilities module
//!
//! Shared helpers for configuration loading and input validation.

/// Environment variable loading utilities
pub mod env_loader;

/// Validation builders and error construction
pub mod validation_builders;

pub use env_loader::{load_env_parsed, EnvLoader};
pub use validation_builders::{quick, ValidationErrorBuilder};
