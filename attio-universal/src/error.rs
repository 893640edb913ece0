//! Unified error handling for the attio-universal library
//!
//! This module provides the error type hierarchy shared by the metadata
//! resolver, the error enhancement pipeline and the batch executor.

use crate::config::ConfigError;
use crate::enhance::EnhancedError;
use crate::operations::OperationKind;
use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for the attio-universal library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UniversalError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error reported by the remote API, passed through unchanged
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Classified, actionable error produced by the enhancement pipeline
    #[error(transparent)]
    Enhanced(#[from] EnhancedError),

    /// Batch request larger than the configured ceiling
    #[error("Batch size ({requested}) exceeds maximum allowed ({max})")]
    BatchSizeExceeded {
        /// Number of items that were requested
        requested: usize,
        /// Configured maximum batch size
        max: usize,
    },

    /// Operation kind that cannot be executed as a batch
    #[error("Operation '{0}' cannot be executed as a batch")]
    UnsupportedBatchOperation(OperationKind),

    /// Caller supplied malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Search filter rejected before reaching the remote API
    #[error("Invalid value '{value}' for attribute '{attribute}'. Valid options are: {}", .valid_options.join(", "))]
    FilterValidation {
        /// Attribute slug the filter targets
        attribute: String,
        /// Value that is not an option of the attribute
        value: String,
        /// Titles of the options that would be accepted
        valid_options: Vec<String>,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Generic error with context
    #[error("{message}")]
    Context {
        /// Description of what was being attempted
        message: String,
        /// Underlying cause
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl UniversalError {
    /// The remote error underneath this error, if any
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            UniversalError::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// Kind tag of an enhanced error, if this error went through the pipeline
    pub fn kind_name(&self) -> Option<&'static str> {
        match self {
            UniversalError::Enhanced(err) => Some(err.name()),
            _ => None,
        }
    }
}

/// Error returned by the remote API or by one of its collaborators
///
/// The display form is exactly the upstream message so that nothing is lost
/// when it is recorded as a batch item error or embedded in a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Message text as reported upstream
    pub message: String,
    /// HTTP status code, when the transport carried one
    pub status: Option<u16>,
    /// Machine-readable error code, when the API returned one
    pub code: Option<String>,
}

impl RemoteError {
    /// Create a remote error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// Create a remote error carrying an HTTP status code
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            code: None,
        }
    }

    /// An error with no usable message, such as a dropped connection
    pub fn opaque() -> Self {
        Self::new("")
    }

    /// Attach a machine-readable code
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Result type alias for attio-universal operations
pub type Result<T> = std::result::Result<T, UniversalError>;

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, msg: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<S: Into<String>>(self, msg: S) -> Result<T> {
        self.map_err(|e| UniversalError::Context {
            message: msg.into(),
            source: Box::new(e),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| UniversalError::Context {
            message: f().into(),
            source: Box::new(e),
        })
    }
}

/// Error chain formatter for detailed error reporting
pub struct ErrorChain<'a>(&'a dyn std::error::Error);

impl<'a> fmt::Display for ErrorChain<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.0)?;

        let mut current = self.0.source();
        let mut level = 1;

        while let Some(err) = current {
            writeln!(f, "{:indent$}Caused by: {}", "", err, indent = level * 2)?;
            current = err.source();
            level += 1;
        }

        Ok(())
    }
}

/// Extension trait for error types to format the full error chain
pub trait ErrorChainExt {
    /// Format the full error chain
    fn error_chain(&self) -> ErrorChain<'_>;
}

impl<E: std::error::Error> ErrorChainExt for E {
    fn error_chain(&self) -> ErrorChain<'_> {
        ErrorChain(self)
    }
}
