use super::{contains_any, QuotedTokens};
use crate::enhance::enhancers::ComplexType;
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use async_trait::async_trait;

const PATTERNS: [&str; 8] = [
    "record reference",
    "record-reference",
    "record_reference",
    "referenced record",
    "target_record_id",
    "target_object",
    "invalid reference",
    "reference not found",
];

/// Explains how to reference another record
pub struct RecordReferenceEnhancer {
    tokens: QuotedTokens,
}

impl RecordReferenceEnhancer {
    /// Create the enhancer
    pub fn new() -> Result<Self> {
        Ok(Self {
            tokens: QuotedTokens::new()?,
        })
    }
}

#[async_trait]
impl Enhancer for RecordReferenceEnhancer {
    fn name(&self) -> &'static str {
        "record-reference"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::RecordReference
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        Ok(contains_any(&error.message, &PATTERNS))
    }

    async fn enhance(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>> {
        let reference = ComplexType::RecordReference;
        let attribute = self
            .tokens
            .extract(&error.message)
            .into_iter()
            .find(|token| context.field(token).is_some());

        let subject = match attribute {
            Some(slug) => format!(
                "Invalid record reference in \"{}\" for {}.",
                slug,
                context.resource_type.singular()
            ),
            None => format!(
                "Invalid record reference for {}.",
                context.resource_type.singular()
            ),
        };

        Ok(Some(format!(
            "{subject}\n\nExpected format: {}\n\n{} Search for the target record first to confirm its id.",
            reference.example(),
            reference.notes()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceType;
    use serde_json::json;

    #[test]
    fn test_matches_reference_errors() {
        let enhancer = RecordReferenceEnhancer::new().unwrap();
        let context = CrudErrorContext::create(ResourceType::People, None);
        assert!(enhancer
            .matches(&RemoteError::new("Referenced record does not exist"), &context)
            .unwrap());
        assert!(enhancer
            .matches(&RemoteError::new("target_record_id is not a valid UUID"), &context)
            .unwrap());
        assert!(!enhancer
            .matches(&RemoteError::new("Record not found"), &context)
            .unwrap());
    }

    #[tokio::test]
    async fn test_names_attribute_from_payload() {
        let enhancer = RecordReferenceEnhancer::new().unwrap();
        let data = json!({"name": "Jane", "company": "Acme Inc"});
        let context = CrudErrorContext::create(ResourceType::People, data.as_object());
        let error = RemoteError::new(r#"Invalid reference for "company""#);

        let message = enhancer.enhance(&error, &context).await.unwrap().unwrap();
        assert!(message.starts_with(r#"Invalid record reference in "company" for person."#));
        assert!(message.contains("target_record_id"));
    }
}
