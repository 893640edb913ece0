//! Single-record operations and the collaborator traits they rely on
//!
//! [`RecordBackend`] is the raw remote API: it reports failures as
//! [`RemoteError`]s exactly as received. [`RecordOperations`] is the
//! normalized single-record executor the batch executor dispatches to;
//! [`UniversalRecordService`] implements it over a backend, validating input
//! and classifying failures through the enhancement pipeline.

use crate::error::{RemoteError, Result};
use crate::resource::{RecordData, ResourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Pre-flight validation of search filters
pub mod filters;

/// In-memory backend for tests and local development
pub mod mock;

/// Backend-driven implementation of [`RecordOperations`]
pub mod service;

pub use filters::{validate_condition, validate_filters};
pub use mock::{MockBackendConfig, MockRecordBackend};
pub use service::UniversalRecordService;

/// Generic record operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create a record from a payload
    Create,
    /// Update a record by id
    Update,
    /// Delete a record by id
    Delete,
    /// Fetch a record by id
    Get,
    /// Query records
    Search,
}

impl OperationKind {
    /// Whether the batch executor accepts this operation
    pub fn is_batchable(&self) -> bool {
        !matches!(self, OperationKind::Search)
    }

    /// Whether items of this operation need a record id
    pub fn requires_record_id(&self) -> bool {
        matches!(
            self,
            OperationKind::Update | OperationKind::Delete | OperationKind::Get
        )
    }

    /// Whether items of this operation need a payload
    pub fn requires_data(&self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Update)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Get => "get",
            OperationKind::Search => "search",
        };
        f.write_str(name)
    }
}

/// Comparison applied by a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Exact match
    Equals,
    /// Anything but an exact match
    NotEquals,
    /// Substring match
    Contains,
    /// Prefix match
    StartsWith,
    /// Suffix match
    EndsWith,
    /// Numeric or date comparison
    GreaterThan,
    /// Numeric or date comparison
    LessThan,
    /// Attribute has no value
    IsEmpty,
    /// Attribute has a value
    IsNotEmpty,
}

/// One attribute condition of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Attribute slug or title
    pub attribute: String,
    /// Comparison
    pub operator: FilterOperator,
    /// Operand; ignored by the emptiness operators
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    /// Create a condition
    pub fn new(attribute: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an equals condition
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, FilterOperator::Equals, value)
    }
}

/// A search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query
    #[serde(default)]
    pub query: Option<String>,
    /// Attribute conditions, all of which must hold
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    /// Maximum number of results; the configured default when absent
    #[serde(default)]
    pub limit: Option<usize>,
    /// Results to skip
    #[serde(default)]
    pub offset: usize,
    /// Object qualifier for generic records
    #[serde(default)]
    pub object: Option<String>,
}

impl SearchQuery {
    /// An empty query matching everything
    pub fn new() -> Self {
        Self::default()
    }

    /// A free-text query
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Add a filter condition
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Set the result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set the object qualifier
    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }
}

/// Raw remote API calls
///
/// Errors are reported exactly as the remote API produced them.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Create a record
    async fn create(
        &self,
        resource_type: ResourceType,
        data: &RecordData,
    ) -> std::result::Result<Value, RemoteError>;

    /// Update a record
    async fn update(
        &self,
        resource_type: ResourceType,
        record_id: &str,
        data: &RecordData,
    ) -> std::result::Result<Value, RemoteError>;

    /// Delete a record
    async fn delete(
        &self,
        resource_type: ResourceType,
        record_id: &str,
    ) -> std::result::Result<(), RemoteError>;

    /// Fetch a record
    async fn get(
        &self,
        resource_type: ResourceType,
        record_id: &str,
    ) -> std::result::Result<Value, RemoteError>;

    /// Query records; `query.limit` is always set by the caller
    async fn search(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> std::result::Result<Vec<Value>, RemoteError>;
}

/// Secondary lookup used to find the record behind a uniqueness conflict
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Records whose `field` holds `value`
    async fn find_by_unique_field(
        &self,
        resource_type: ResourceType,
        field: &str,
        value: &str,
    ) -> std::result::Result<Vec<Value>, RemoteError>;
}

/// Single-record executor
#[async_trait]
pub trait RecordOperations: Send + Sync {
    /// Create a record
    async fn create_record(&self, resource_type: ResourceType, data: &RecordData) -> Result<Value>;

    /// Update a record
    async fn update_record(
        &self,
        resource_type: ResourceType,
        record_id: &str,
        data: &RecordData,
    ) -> Result<Value>;

    /// Delete a record, returning a confirmation payload
    async fn delete_record(&self, resource_type: ResourceType, record_id: &str) -> Result<Value>;

    /// Fetch a record
    async fn get_record(&self, resource_type: ResourceType, record_id: &str) -> Result<Value>;

    /// Query records
    async fn search_records(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Result<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_kind_properties() {
        assert!(OperationKind::Create.is_batchable());
        assert!(!OperationKind::Search.is_batchable());
        assert!(OperationKind::Update.requires_record_id());
        assert!(OperationKind::Update.requires_data());
        assert!(!OperationKind::Get.requires_data());
        assert!(!OperationKind::Create.requires_record_id());
        assert_eq!(OperationKind::Delete.to_string(), "delete");
        assert_eq!(serde_json::to_value(OperationKind::Get).unwrap(), json!("get"));
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::text("acme")
            .filter(FilterCondition::equals("stage", "Lead"))
            .limit(10)
            .offset(20)
            .object("deals");

        assert_eq!(query.query.as_deref(), Some("acme"));
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.filters[0].operator, FilterOperator::Equals);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 20);
        assert_eq!(query.object.as_deref(), Some("deals"));
    }

    #[test]
    fn test_search_query_deserializes_with_defaults() {
        let query: SearchQuery = serde_json::from_value(json!({
            "filters": [{"attribute": "name", "operator": "starts_with", "value": "Ac"}]
        }))
        .unwrap();

        assert_eq!(query.filters[0].operator, FilterOperator::StartsWith);
        assert_eq!(query.limit, None);
        assert_eq!(query.offset, 0);
    }
}
