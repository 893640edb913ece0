use super::{contains_any, QuotedTokens};
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use crate::metadata::{AttributeMetadata, MetadataFetchResult, MetadataResolver};
use async_trait::async_trait;
use serde_json::Value;

const PATTERNS: [&str; 8] = [
    "select option",
    "status option",
    "invalid option",
    "option not found",
    "invalid select",
    "invalid status",
    "cannot find status",
    "not a valid option",
];

/// Lists the valid options of a select or status attribute
pub struct SelectOptionEnhancer {
    resolver: MetadataResolver,
    tokens: QuotedTokens,
}

impl SelectOptionEnhancer {
    /// Create the enhancer
    pub fn new(resolver: MetadataResolver) -> Result<Self> {
        Ok(Self {
            resolver,
            tokens: QuotedTokens::new()?,
        })
    }
}

fn payload_value(context: &CrudErrorContext, slug: &str) -> Option<String> {
    match context.field(slug)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn target_attribute<'a>(
    metadata: &'a MetadataFetchResult,
    tokens: &[String],
    message: &str,
    context: &CrudErrorContext,
) -> Option<&'a AttributeMetadata> {
    let select_like = |attribute: &&AttributeMetadata| attribute.attribute_type.is_select_like();
    let message = message.to_lowercase();

    tokens
        .iter()
        .filter_map(|token| metadata.find(token))
        .find(select_like)
        .or_else(|| {
            let mut named: Vec<_> = metadata
                .metadata_map
                .values()
                .filter(select_like)
                .filter(|attribute| message.contains(&attribute.slug.to_lowercase()))
                .collect();
            named.sort_by_key(|attribute| std::cmp::Reverse(attribute.slug.len()));
            named.into_iter().next()
        })
        .or_else(|| {
            context
                .field_names()
                .into_iter()
                .filter_map(|name| metadata.find(name))
                .find(select_like)
        })
}

#[async_trait]
impl Enhancer for SelectOptionEnhancer {
    fn name(&self) -> &'static str {
        "select-option"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::InvalidSelectOption
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        let message = &error.message;
        Ok(contains_any(message, &PATTERNS)
            || (contains_any(message, &["option"])
                && contains_any(
                    message,
                    &["cannot find", "not found", "does not exist", "unknown", "invalid"],
                )))
    }

    async fn enhance(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>> {
        let metadata = self
            .resolver
            .fetch_metadata_lenient(context.resource_type, &context.metadata_options())
            .await;
        if metadata.is_empty() {
            return Ok(None);
        }

        let tokens = self.tokens.extract(&error.message);
        let Some(attribute) = target_attribute(&metadata, &tokens, &error.message, context) else {
            return Ok(None);
        };

        let options: Vec<&str> = attribute
            .active_options()
            .map(|option| option.title.as_str())
            .collect();
        if options.is_empty() {
            return Ok(None);
        }

        let value = tokens
            .iter()
            .find(|token| !attribute.answers_to(token))
            .cloned()
            .or_else(|| payload_value(context, &attribute.slug));

        let subject = match value {
            Some(value) => format!("Invalid value \"{}\" for \"{}\".", value, attribute.slug),
            None => format!("Invalid option for \"{}\".", attribute.slug),
        };

        Ok(Some(format!(
            "{subject} Valid options are: {}",
            options.join(", ")
        )))
    }
}
