use super::contains_any;
use crate::enhance::extract::{extract_unique_field, UniqueFieldCandidate};
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use crate::operations::RecordLookup;
use crate::resource::{record_id, ResourceType};
use async_trait::async_trait;
use std::sync::Arc;

const PATTERNS: [&str; 2] = ["duplicate", "uniqueness constraint"];

/// Names the existing record behind a uniqueness conflict
pub struct UniquenessEnhancer {
    lookup: Arc<dyn RecordLookup>,
}

impl UniquenessEnhancer {
    /// Create the enhancer over a record lookup
    pub fn new(lookup: Arc<dyn RecordLookup>) -> Self {
        Self { lookup }
    }

    async fn find_conflict(
        &self,
        resource_type: ResourceType,
        candidate: &UniqueFieldCandidate,
    ) -> Option<String> {
        match self
            .lookup
            .find_by_unique_field(resource_type, candidate.field, &candidate.value)
            .await
        {
            Ok(records) => records.first().and_then(record_id),
            Err(e) => {
                tracing::debug!(
                    "Conflict lookup by {} failed for {}: {}",
                    candidate.field,
                    resource_type,
                    e
                );
                None
            }
        }
    }
}

fn detailed_guidance(
    resource_type: ResourceType,
    candidate: &UniqueFieldCandidate,
    existing_id: &str,
) -> String {
    let singular = resource_type.singular();
    format!(
        "A {singular} with {field} \"{value}\" already exists (ID: {existing_id}).\n\n\
         Next steps:\n\
         1. Update the existing {singular} with record_id \"{existing_id}\" instead of creating a new one\n\
         2. View the existing {singular} with record_id \"{existing_id}\" to confirm it is the same\n\
         3. Use a different {field} value to create a separate {singular}",
        field = candidate.field,
        value = candidate.value,
    )
}

fn generic_guidance(resource_type: ResourceType, candidate: Option<&UniqueFieldCandidate>) -> String {
    let singular = resource_type.singular();
    let subject = match candidate {
        Some(candidate) => format!(
            "A {singular} with {} \"{}\" already exists.",
            candidate.field, candidate.value
        ),
        None => format!("A {singular} with the same unique value already exists."),
    };
    format!(
        "{subject}\n\nSearch {resource_type} for the existing record and update it, \
         or use a different value for the unique field."
    )
}

#[async_trait]
impl Enhancer for UniquenessEnhancer {
    fn name(&self) -> &'static str {
        "uniqueness"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::Duplicate
    }

    fn supports(&self, resource_type: ResourceType) -> bool {
        !matches!(resource_type, ResourceType::Tasks | ResourceType::Notes)
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        Ok(contains_any(&error.message, &PATTERNS))
    }

    async fn enhance(
        &self,
        _error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>> {
        let resource_type = context.resource_type;
        let candidate = context.record_data.as_ref().and_then(extract_unique_field);

        let Some(candidate) = candidate else {
            return Ok(Some(generic_guidance(resource_type, None)));
        };

        tracing::debug!(
            "Looking up {} conflict by {} (rule {})",
            resource_type,
            candidate.field,
            candidate.rule
        );

        let message = match self.find_conflict(resource_type, &candidate).await {
            Some(existing_id) => detailed_guidance(resource_type, &candidate, &existing_id),
            None => generic_guidance(resource_type, Some(&candidate)),
        };
        Ok(Some(message))
    }
}
