//! Mock in-memory backend for testing
//!
//! `MockRecordBackend` stores records in memory and enforces a small subset of
//! the remote API's rules so the whole pipeline can be exercised without a
//! network:
//!
//! - unknown attribute slugs are rejected
//! - required attributes must be present on create
//! - select and status values must be active options
//! - domains and email addresses are unique per resource type
//!
//! It also serves attribute schemas ([`AttributeLoader`]) and conflict
//! lookups ([`RecordLookup`]), and can be configured to fail or slow down.
//!
//! # Usage
//!
//! ```rust
//! use attio_universal::operations::{MockRecordBackend, RecordBackend};
//! use attio_universal::ResourceType;
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let backend = MockRecordBackend::new();
//! let data = json!({"name": "Acme", "domains": ["acme.com"]});
//! let record = backend
//!     .create(ResourceType::Companies, data.as_object().unwrap())
//!     .await
//!     .unwrap();
//! assert!(record["id"]["record_id"].is_string());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use super::{FilterCondition, FilterOperator, RecordBackend, RecordLookup, SearchQuery};
use crate::enhance::extract::UNIQUE_FIELD_RULES;
use crate::error::RemoteError;
use crate::metadata::{AttributeLoader, AttributeMetadata, RawAttributeList};
use crate::resource::{record_id, RecordData, ResourceType};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use ulid::Ulid;

type SchemaKey = (ResourceType, Option<String>);

/// Payload keys that qualify a record rather than set an attribute
const RESERVED_KEYS: [&str; 3] = ["object", "object_api_slug", "values"];

/// Options controlling mock behaviour
#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    /// Fail every create
    pub fail_create: bool,
    /// Fail every update
    pub fail_update: bool,
    /// Fail every delete
    pub fail_delete: bool,
    /// Fail every get
    pub fail_get: bool,
    /// Fail every search
    pub fail_search: bool,
    /// Fail every conflict lookup
    pub fail_lookup: bool,
    /// Error returned by attribute loads, if any
    pub attribute_error: Option<RemoteError>,
    /// Message of simulated operation failures
    pub failure_message: String,
    /// Reject payloads that break the attribute schema
    pub enforce_schema: bool,
    /// Maximum number of records per resource type
    pub max_records: Option<usize>,
    /// Delay added to every call, in milliseconds
    pub operation_delay_ms: Option<u64>,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            fail_create: false,
            fail_update: false,
            fail_delete: false,
            fail_get: false,
            fail_search: false,
            fail_lookup: false,
            attribute_error: None,
            failure_message: "Mock backend failure".to_string(),
            enforce_schema: true,
            max_records: None,
            operation_delay_ms: None,
        }
    }
}

/// In-memory [`RecordBackend`]
#[derive(Debug, Clone)]
pub struct MockRecordBackend {
    records: Arc<RwLock<HashMap<ResourceType, Vec<Value>>>>,
    schemas: Arc<RwLock<HashMap<SchemaKey, RawAttributeList>>>,
    config: Arc<RwLock<MockBackendConfig>>,
    calls: Arc<AtomicUsize>,
    attribute_loads: Arc<AtomicUsize>,
}

impl MockRecordBackend {
    /// Empty backend with the standard schemas and no simulated failures
    pub fn new() -> Self {
        Self::new_with_config(MockBackendConfig::default())
    }

    /// Empty backend with custom behaviour
    pub fn new_with_config(config: MockBackendConfig) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            schemas: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(RwLock::new(config)),
            calls: Arc::new(AtomicUsize::new(0)),
            attribute_loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the behaviour configuration
    pub async fn set_config(&self, config: MockBackendConfig) {
        *self.config.write().await = config;
    }

    /// Override the attribute schema of a resource type
    pub async fn set_attributes(
        &self,
        resource_type: ResourceType,
        object: Option<&str>,
        attributes: RawAttributeList,
    ) {
        self.schemas
            .write()
            .await
            .insert((resource_type, object.map(str::to_string)), attributes);
    }

    /// Store a record directly, bypassing validation
    pub async fn insert_record(&self, resource_type: ResourceType, values: RecordData) -> Value {
        let record = new_record(resource_type, values);
        self.records
            .write()
            .await
            .entry(resource_type)
            .or_default()
            .push(record.clone());
        record
    }

    /// Number of stored records of a resource type
    pub async fn record_count(&self, resource_type: ResourceType) -> usize {
        self.records
            .read()
            .await
            .get(&resource_type)
            .map_or(0, Vec::len)
    }

    /// Drop every stored record
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    /// Record operations received so far (create, update, delete, get, search)
    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attribute schema loads received so far
    pub fn attribute_loads(&self) -> usize {
        self.attribute_loads.load(Ordering::SeqCst)
    }

    /// Built-in attribute schema of a resource type
    pub fn standard_attributes(resource_type: ResourceType, object: Option<&str>) -> RawAttributeList {
        let data = match resource_type {
            ResourceType::Companies => vec![
                json!({"api_slug": "name", "title": "Name", "type": "text", "is_required": true}),
                json!({"api_slug": "domains", "slug": "domain", "title": "Domains", "type": "domain", "is_unique": true, "is_multiselect": true}),
                json!({"api_slug": "description", "title": "Description", "type": "text"}),
                json!({"api_slug": "categories", "title": "Categories", "type": "select", "is_multiselect": true, "options": [
                    {"id": {"option_id": "cat-saas"}, "title": "SaaS", "is_archived": false},
                    {"id": {"option_id": "cat-b2b"}, "title": "B2B", "is_archived": false},
                    {"id": {"option_id": "cat-retired"}, "title": "Retired", "is_archived": true}
                ]}),
                json!({"api_slug": "primary_location", "title": "Primary Location", "type": "location"}),
                json!({"api_slug": "team", "title": "Team", "type": "record-reference", "is_multiselect": true}),
            ],
            ResourceType::People => vec![
                json!({"api_slug": "name", "title": "Name", "type": "personal-name", "is_required": true}),
                json!({"api_slug": "email_addresses", "slug": "email", "title": "Email Addresses", "type": "email-address", "is_unique": true, "is_multiselect": true}),
                json!({"api_slug": "phone_numbers", "title": "Phone Numbers", "type": "phone-number", "is_multiselect": true}),
                json!({"api_slug": "job_title", "title": "Job Title", "type": "text"}),
                json!({"api_slug": "company", "title": "Company", "type": "record-reference"}),
            ],
            ResourceType::Deals => vec![
                json!({"api_slug": "name", "title": "Deal Name", "type": "text", "is_required": true}),
                json!({"api_slug": "stage", "title": "Deal Stage", "type": "status", "statuses": [
                    {"id": {"status_id": "stage-lead"}, "title": "Lead", "is_archived": false},
                    {"id": {"status_id": "stage-progress"}, "title": "In Progress", "is_archived": false},
                    {"id": {"status_id": "stage-won"}, "title": "Won", "is_archived": false},
                    {"id": {"status_id": "stage-lost"}, "title": "Lost", "is_archived": true}
                ]}),
                json!({"api_slug": "value", "title": "Deal Value", "type": "currency"}),
                json!({"api_slug": "associated_company", "title": "Associated Company", "type": "record-reference"}),
            ],
            ResourceType::Tasks => vec![
                json!({"api_slug": "content", "title": "Content", "type": "text", "is_required": true}),
                json!({"api_slug": "deadline_at", "title": "Deadline", "type": "timestamp"}),
                json!({"api_slug": "is_completed", "title": "Completed", "type": "checkbox"}),
                json!({"api_slug": "assignees", "title": "Assignees", "type": "actor-reference", "is_multiselect": true}),
            ],
            ResourceType::Lists => vec![
                json!({"api_slug": "name", "title": "List Name", "type": "text", "is_required": true}),
                json!({"api_slug": "parent_object", "title": "Parent Object", "type": "text"}),
            ],
            ResourceType::Notes => vec![
                json!({"api_slug": "title", "title": "Title", "type": "text", "is_required": true}),
                json!({"api_slug": "content", "title": "Content", "type": "text"}),
                json!({"api_slug": "parent_record_id", "title": "Parent Record", "type": "text"}),
            ],
            ResourceType::Records => vec![
                json!({"api_slug": "name", "title": "Name", "type": "text", "is_required": true}),
                json!({"api_slug": format!("{}_code", object.unwrap_or("record")), "title": "Code", "type": "text"}),
            ],
        };
        RawAttributeList::new(data)
    }

    async fn schema(&self, resource_type: ResourceType, data: &RecordData) -> Vec<AttributeMetadata> {
        let object = resource_type.object_qualifier(None, Some(data));
        let key = (resource_type, object);
        let raw = match self.schemas.read().await.get(&key) {
            Some(raw) => raw.clone(),
            None => Self::standard_attributes(resource_type, key.1.as_deref()),
        };
        raw.into_attribute_map().into_values().collect()
    }

    async fn begin(&self, fail: impl Fn(&MockBackendConfig) -> bool) -> Result<bool, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let config = self.config.read().await.clone();
        if let Some(delay_ms) = config.operation_delay_ms {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }
        if fail(&config) {
            return Err(RemoteError::with_status(500, config.failure_message));
        }
        Ok(config.enforce_schema)
    }

    fn check_schema(
        schema: &[AttributeMetadata],
        data: &RecordData,
        check_required: bool,
    ) -> Result<(), RemoteError> {
        let values = attribute_values(data);

        for (key, value) in &values {
            let Some(attribute) = schema.iter().find(|attr| attr.answers_to(key)) else {
                return Err(RemoteError::with_status(
                    400,
                    format!("Cannot find attribute with slug/ID \"{key}\"."),
                )
                .code("unknown_attribute"));
            };

            if attribute.attribute_type.is_select_like() && !attribute.options.is_empty() {
                let chosen: Vec<&str> = match value {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };
                if let Some(invalid) = chosen
                    .into_iter()
                    .find(|choice| !attribute.active_options().any(|option| option.matches(choice)))
                {
                    return Err(RemoteError::with_status(
                        400,
                        format!("Cannot find select option with title \"{invalid}\"."),
                    )
                    .code("invalid_select_option"));
                }
            }
        }

        if check_required {
            if let Some(missing) = schema
                .iter()
                .filter(|attr| attr.is_required)
                .find(|attr| !values.iter().any(|(key, _)| attr.answers_to(key)))
            {
                return Err(RemoteError::with_status(
                    400,
                    format!("Missing required attribute \"{}\".", missing.slug),
                )
                .code("missing_required"));
            }
        }

        Ok(())
    }

    fn find_conflict<'a>(
        records: &'a [Value],
        data: &RecordData,
        exclude_id: Option<&str>,
    ) -> Option<&'a Value> {
        let values: RecordData = attribute_values(data)
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        UNIQUE_FIELD_RULES
            .iter()
            .filter_map(|rule| rule.apply(&values).map(|value| (rule.field, value)))
            .find_map(|(field, value)| {
                records.iter().find(|record| {
                    record_id(record).as_deref() != exclude_id
                        && holds_unique_value(record, field, &value)
                })
            })
    }
}

impl Default for MockRecordBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Attribute entries of a payload, from the top level or a nested `values` map
fn attribute_values(data: &RecordData) -> Vec<(&str, &Value)> {
    let nested = data.get("values").and_then(Value::as_object);
    data.iter()
        .chain(nested.into_iter().flatten())
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

fn holds_unique_value(record: &Value, field: &str, value: &str) -> bool {
    let Some(values) = record.get("values").and_then(Value::as_object) else {
        return false;
    };
    UNIQUE_FIELD_RULES
        .iter()
        .filter(|rule| rule.field == field)
        .filter_map(|rule| rule.apply(values))
        .any(|stored| stored.eq_ignore_ascii_case(value))
}

fn id_key(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Tasks => "task_id",
        ResourceType::Lists => "list_id",
        ResourceType::Notes => "note_id",
        _ => "record_id",
    }
}

fn new_record(resource_type: ResourceType, data: RecordData) -> Value {
    let values: RecordData = attribute_values(&data)
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    let mut id = serde_json::Map::new();
    id.insert(id_key(resource_type).to_string(), json!(Ulid::new().to_string()));
    if let Some(object) = resource_type.object_qualifier(None, Some(&data)) {
        id.insert("object_id".to_string(), json!(object));
    }

    json!({
        "id": id,
        "created_at": Utc::now().to_rfc3339(),
        "values": values,
    })
}

fn record_text(record: &Value) -> String {
    record
        .get("values")
        .map(Value::to_string)
        .unwrap_or_default()
        .to_lowercase()
}

fn condition_holds(record: &Value, condition: &FilterCondition) -> bool {
    let field = record
        .get("values")
        .and_then(|values| values.get(&condition.attribute));
    let is_empty = match field {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    };

    let text_of = |value: &Value| -> Vec<String> {
        match value {
            Value::String(s) => vec![s.to_lowercase()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.to_lowercase(),
                    other => other.to_string().to_lowercase(),
                })
                .collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_string().to_lowercase()],
        }
    };
    let stored = field.map(text_of).unwrap_or_default();
    let wanted = match &condition.value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    let number = |value: Option<&Value>| value.and_then(Value::as_f64);

    match condition.operator {
        FilterOperator::Equals => stored.iter().any(|s| *s == wanted),
        FilterOperator::NotEquals => !stored.iter().any(|s| *s == wanted),
        FilterOperator::Contains => stored.iter().any(|s| s.contains(&wanted)),
        FilterOperator::StartsWith => stored.iter().any(|s| s.starts_with(&wanted)),
        FilterOperator::EndsWith => stored.iter().any(|s| s.ends_with(&wanted)),
        FilterOperator::GreaterThan => matches!(
            (number(field), condition.value.as_f64()),
            (Some(a), Some(b)) if a > b
        ),
        FilterOperator::LessThan => matches!(
            (number(field), condition.value.as_f64()),
            (Some(a), Some(b)) if a < b
        ),
        FilterOperator::IsEmpty => is_empty,
        FilterOperator::IsNotEmpty => !is_empty,
    }
}

fn not_found() -> RemoteError {
    RemoteError::with_status(404, "Record not found").code("not_found")
}

#[async_trait]
impl RecordBackend for MockRecordBackend {
    async fn create(&self, resource_type: ResourceType, data: &RecordData) -> Result<Value, RemoteError> {
        let enforce = self.begin(|config| config.fail_create).await?;
        if enforce {
            Self::check_schema(&self.schema(resource_type, data).await, data, true)?;
        }

        let max_records = self.config.read().await.max_records;
        let mut records = self.records.write().await;
        let stored = records.entry(resource_type).or_default();

        if max_records.is_some_and(|max| stored.len() >= max) {
            return Err(RemoteError::with_status(429, "Record limit reached"));
        }
        if Self::find_conflict(stored, data, None).is_some() {
            return Err(RemoteError::with_status(409, "Uniqueness constraint violated").code("conflict"));
        }

        let record = new_record(resource_type, data.clone());
        stored.push(record.clone());
        tracing::trace!("Mock created {} record", resource_type);
        Ok(record)
    }

    async fn update(
        &self,
        resource_type: ResourceType,
        record_id_value: &str,
        data: &RecordData,
    ) -> Result<Value, RemoteError> {
        let enforce = self.begin(|config| config.fail_update).await?;
        if enforce {
            Self::check_schema(&self.schema(resource_type, data).await, data, false)?;
        }

        let mut records = self.records.write().await;
        let stored = records.entry(resource_type).or_default();

        if Self::find_conflict(stored, data, Some(record_id_value)).is_some() {
            return Err(RemoteError::with_status(409, "Uniqueness constraint violated").code("conflict"));
        }

        let record = stored
            .iter_mut()
            .find(|record| record_id(record).as_deref() == Some(record_id_value))
            .ok_or_else(not_found)?;

        if let Some(values) = record.get_mut("values").and_then(Value::as_object_mut) {
            for (key, value) in attribute_values(data) {
                values.insert(key.to_string(), value.clone());
            }
        }
        if let Some(fields) = record.as_object_mut() {
            fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }
        Ok(record.clone())
    }

    async fn delete(&self, resource_type: ResourceType, record_id_value: &str) -> Result<(), RemoteError> {
        self.begin(|config| config.fail_delete).await?;

        let mut records = self.records.write().await;
        let stored = records.entry(resource_type).or_default();
        let position = stored
            .iter()
            .position(|record| record_id(record).as_deref() == Some(record_id_value))
            .ok_or_else(not_found)?;
        stored.remove(position);
        Ok(())
    }

    async fn get(&self, resource_type: ResourceType, record_id_value: &str) -> Result<Value, RemoteError> {
        self.begin(|config| config.fail_get).await?;

        self.records
            .read()
            .await
            .get(&resource_type)
            .and_then(|stored| {
                stored
                    .iter()
                    .find(|record| record_id(record).as_deref() == Some(record_id_value))
            })
            .cloned()
            .ok_or_else(not_found)
    }

    async fn search(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Result<Vec<Value>, RemoteError> {
        self.begin(|config| config.fail_search).await?;

        let text = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);

        let records = self.records.read().await;
        let results: Vec<Value> = records
            .get(&resource_type)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|record| {
                        text.as_ref()
                            .map_or(true, |text| record_text(record).contains(text.as_str()))
                    })
                    .filter(|record| {
                        query
                            .filters
                            .iter()
                            .all(|condition| condition_holds(record, condition))
                    })
                    .skip(query.offset)
                    .take(query.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }
}

#[async_trait]
impl RecordLookup for MockRecordBackend {
    async fn find_by_unique_field(
        &self,
        resource_type: ResourceType,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        if self.config.read().await.fail_lookup {
            return Err(RemoteError::with_status(503, "Lookup unavailable"));
        }

        Ok(self
            .records
            .read()
            .await
            .get(&resource_type)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|record| holds_unique_value(record, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AttributeLoader for MockRecordBackend {
    async fn load_attributes(
        &self,
        resource_type: ResourceType,
        object: Option<&str>,
    ) -> Result<RawAttributeList, RemoteError> {
        self.attribute_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.config.read().await.attribute_error.clone() {
            return Err(error);
        }

        let key = (resource_type, object.map(str::to_string));
        Ok(match self.schemas.read().await.get(&key) {
            Some(raw) => raw.clone(),
            None => Self::standard_attributes(resource_type, object),
        })
    }
}
