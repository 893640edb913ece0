use super::{contains_any, QuotedTokens};
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use crate::metadata::MetadataResolver;
use async_trait::async_trait;

const PATTERNS: [&str; 6] = [
    "required field",
    "missing required",
    "is required",
    "are required",
    "required attribute",
    "must be provided",
];

/// Lists the required attributes a create payload is missing
pub struct RequiredFieldsEnhancer {
    resolver: MetadataResolver,
    tokens: QuotedTokens,
}

impl RequiredFieldsEnhancer {
    /// Create the enhancer
    pub fn new(resolver: MetadataResolver) -> Result<Self> {
        Ok(Self {
            resolver,
            tokens: QuotedTokens::new()?,
        })
    }
}

#[async_trait]
impl Enhancer for RequiredFieldsEnhancer {
    fn name(&self) -> &'static str {
        "required-fields"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        Ok(contains_any(&error.message, &PATTERNS))
    }

    async fn enhance(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>> {
        let resource_type = context.resource_type;
        let metadata = self
            .resolver
            .fetch_metadata_lenient(resource_type, &context.metadata_options())
            .await;
        let present = context.field_names();
        let required = metadata.required_attributes();

        let mut missing: Vec<String> = required
            .iter()
            .filter(|attr| !present.iter().any(|name| attr.answers_to(name)))
            .map(|attr| attr.slug.clone())
            .collect();

        if missing.is_empty() {
            missing = self
                .tokens
                .extract(&error.message)
                .into_iter()
                .filter(|token| !present.contains(&token.as_str()))
                .collect();
            missing.dedup();
        }

        let mut message = if missing.is_empty() {
            format!(
                "Missing required fields for {}. Include every attribute {} marks as required.",
                resource_type.singular(),
                resource_type
            )
        } else {
            format!(
                "Missing required fields for {}: {}",
                resource_type.singular(),
                missing.join(", ")
            )
        };

        if !required.is_empty() {
            let all: Vec<&str> = required.iter().map(|attr| attr.slug.as_str()).collect();
            message.push_str(&format!(
                "\n\nRequired fields for {}: {}",
                resource_type,
                all.join(", ")
            ));
        }
        message.push_str("\n\nAdd the missing fields to the record data and try again.");

        Ok(Some(message))
    }
}
