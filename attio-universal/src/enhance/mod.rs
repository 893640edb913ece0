//! Error enhancement pipeline
//!
//! Remote API errors are terse ("Cannot find attribute with slug/ID
//! \"compny_name\"", "Uniqueness constraint violated"). The pipeline runs
//! such an error through an ordered chain of [`Enhancer`]s and turns the
//! first match into an [`EnhancedError`] with resource-aware guidance.
//!
//! Create operations use the chain
//! `required-fields → uniqueness → attribute-not-found → complex-type →
//! select-option → record-reference`; update operations use the shared
//! tail only, starting at attribute-not-found. When no enhancer produces a
//! message the coordinator falls back to a generic `create_error` or
//! `update_error` that embeds the original text.

use crate::error::{RemoteError, Result};
use crate::resource::ResourceType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error context handed to every enhancer
pub mod context;

/// The enhancement coordinator
pub mod coordinator;

/// Individual enhancer strategies
pub mod enhancers;

/// Ordered payload extraction rules
pub mod extract;

/// Per-operation enhancer chains
pub mod registry;

pub use context::{CrudErrorContext, CrudOperation};
pub use coordinator::ErrorEnhancementCoordinator;
pub use registry::EnhancerRegistry;

/// Classification tag carried by an [`EnhancedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required fields are missing
    #[serde(rename = "validation_error")]
    Validation,
    /// A unique value is already taken
    #[serde(rename = "duplicate_error")]
    Duplicate,
    /// The payload names an attribute that does not exist
    AttributeNotFound,
    /// A structured value has the wrong shape
    #[serde(rename = "complex_type_error")]
    ComplexType,
    /// A select or status value is not one of the options
    InvalidSelectOption,
    /// A record reference points nowhere or is malformed
    #[serde(rename = "record_reference_error")]
    RecordReference,
    /// Unclassified create failure
    #[serde(rename = "create_error")]
    Create,
    /// Unclassified update failure
    #[serde(rename = "update_error")]
    Update,
}

impl ErrorKind {
    /// The stable tag name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Duplicate => "duplicate_error",
            ErrorKind::AttributeNotFound => "attribute_not_found",
            ErrorKind::ComplexType => "complex_type_error",
            ErrorKind::InvalidSelectOption => "invalid_select_option",
            ErrorKind::RecordReference => "record_reference_error",
            ErrorKind::Create => "create_error",
            ErrorKind::Update => "update_error",
        }
    }

    /// Whether this is one of the generic fallback kinds
    pub fn is_fallback(&self) -> bool {
        matches!(self, ErrorKind::Create | ErrorKind::Update)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified create or update failure
///
/// The display form is the guidance message followed by the original
/// upstream text, unless the message already quotes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedError {
    /// Classification tag
    pub kind: ErrorKind,
    /// Actionable message
    pub message: String,
    /// The upstream error this was derived from
    pub original: RemoteError,
}

impl EnhancedError {
    /// Create an enhanced error
    pub fn new(kind: ErrorKind, message: impl Into<String>, original: RemoteError) -> Self {
        Self {
            kind,
            message: message.into(),
            original,
        }
    }

    /// Generic error used when no enhancer applies
    pub fn fallback(
        operation: CrudOperation,
        resource_type: ResourceType,
        original: RemoteError,
    ) -> Self {
        let kind = match operation {
            CrudOperation::Create => ErrorKind::Create,
            CrudOperation::Update => ErrorKind::Update,
        };
        let message = if original.message.is_empty() {
            format!("Failed to {} {}", operation, resource_type.singular())
        } else {
            format!(
                "Failed to {} {}: {}",
                operation,
                resource_type.singular(),
                original.message
            )
        };
        Self::new(kind, message, original)
    }

    /// The kind tag name
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        let original = &self.original.message;
        if !original.is_empty() && !self.message.contains(original.as_str()) {
            write!(f, "\n\nOriginal error: {original}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EnhancedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.original)
    }
}

/// A strategy that recognizes one class of upstream error
///
/// `matches` is a cheap synchronous test on the error text. `enhance` may
/// consult metadata or look up records, and returns `None` to decline, in
/// which case the next enhancer in the chain is tried.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Tag given to errors this enhancer produces
    fn error_kind(&self) -> ErrorKind;

    /// Whether this enhancer takes part for a resource type
    fn supports(&self, _resource_type: ResourceType) -> bool {
        true
    }

    /// Whether this enhancer recognizes the error
    fn matches(&self, error: &RemoteError, context: &CrudErrorContext) -> Result<bool>;

    /// Build the enhanced message
    async fn enhance(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde_tags() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Duplicate,
            ErrorKind::AttributeNotFound,
            ErrorKind::ComplexType,
            ErrorKind::InvalidSelectOption,
            ErrorKind::RecordReference,
            ErrorKind::Create,
            ErrorKind::Update,
        ] {
            let tag = serde_json::to_value(kind).unwrap();
            assert_eq!(tag.as_str(), Some(kind.name()));
        }
    }

    #[test]
    fn test_fallback_embeds_original_message() {
        let original = RemoteError::new("Something broke upstream");

        let error = EnhancedError::fallback(CrudOperation::Create, ResourceType::Companies, original.clone());
        assert_eq!(error.name(), "create_error");
        assert_eq!(error.message, "Failed to create company: Something broke upstream");
        assert_eq!(error.to_string(), error.message);

        let error = EnhancedError::fallback(CrudOperation::Update, ResourceType::People, original);
        assert_eq!(error.name(), "update_error");
        assert!(error.kind.is_fallback());
        assert!(error.to_string().contains("Something broke upstream"));
    }

    #[test]
    fn test_fallback_with_opaque_original() {
        let error =
            EnhancedError::fallback(CrudOperation::Update, ResourceType::Tasks, RemoteError::opaque());
        assert_eq!(error.to_string(), "Failed to update task");
    }

    #[test]
    fn test_display_appends_original_when_not_quoted() {
        let error = EnhancedError::new(
            ErrorKind::Duplicate,
            "A company with this domain already exists",
            RemoteError::new("Uniqueness constraint violated"),
        );
        assert_eq!(
            error.to_string(),
            "A company with this domain already exists\n\nOriginal error: Uniqueness constraint violated"
        );

        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "Uniqueness constraint violated");
    }
}
