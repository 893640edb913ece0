//! Validation builders and error construction utilities
//!
//! Consistent input-validation messages for record operations, so every
//! rejected input names the operation, the field and what to do instead.

use crate::UniversalError;

/// Builder for validation errors with consistent formatting
#[derive(Debug, Clone, Default)]
pub struct ValidationErrorBuilder {
    context: Option<String>,
    field: Option<String>,
    value: Option<String>,
    reason: Option<String>,
    suggestions: Vec<String>,
}

impl ValidationErrorBuilder {
    /// Create a new validation error builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context where the validation failed
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the field name that failed validation
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the value that failed validation
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the reason for the validation failure
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a suggestion for fixing the validation error
    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render the message without wrapping it in an error
    pub fn message(&self) -> String {
        let mut message = match &self.context {
            Some(context) => format!("Validation failed in {context}"),
            None => "Validation failed".to_string(),
        };

        if let Some(field) = &self.field {
            message.push_str(&format!(" for field '{field}'"));
        }

        if let Some(value) = &self.value {
            message.push_str(&format!(" with value '{value}'"));
        }

        match &self.reason {
            Some(reason) => message.push_str(&format!(": {reason}")),
            None => message.push_str(": validation constraint not met"),
        }

        if !self.suggestions.is_empty() {
            message.push_str(". Suggestions: ");
            message.push_str(&self.suggestions.join(", "));
        }

        message
    }

    /// Build the validation error
    pub fn build(self) -> UniversalError {
        UniversalError::InvalidInput(self.message())
    }
}

/// Quick validation error constructors for common patterns
pub mod quick {
    use super::*;

    /// A required field was not provided for an operation
    pub fn required_field(context: &str, field: &str) -> UniversalError {
        ValidationErrorBuilder::new()
            .context(context)
            .field(field)
            .reason("field is required but was not provided")
            .build()
    }

    /// A value was provided but cannot be used
    pub fn invalid_value(context: &str, field: &str, value: &str, reason: &str) -> UniversalError {
        ValidationErrorBuilder::new()
            .context(context)
            .field(field)
            .value(value)
            .reason(reason)
            .build()
    }

    /// A numeric value lies outside its accepted range
    pub fn out_of_range<T: std::fmt::Display>(field: &str, value: T, min: T, max: T) -> UniversalError {
        ValidationErrorBuilder::new()
            .field(field)
            .value(value.to_string())
            .reason(format!("value must be between {min} and {max} (inclusive)"))
            .build()
    }
}
