use crate::metadata::MetadataOptions;
use crate::resource::{RecordData, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mutating operation an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOperation {
    /// Record creation
    Create,
    /// Record update
    Update,
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudOperation::Create => f.write_str("create"),
            CrudOperation::Update => f.write_str("update"),
        }
    }
}

/// Immutable description of the call that failed
#[derive(Debug, Clone, PartialEq)]
pub struct CrudErrorContext {
    /// Create or update
    pub operation: CrudOperation,
    /// Target resource type
    pub resource_type: ResourceType,
    /// Payload that was sent, if any
    pub record_data: Option<RecordData>,
    /// Record being updated
    pub record_id: Option<String>,
}

impl CrudErrorContext {
    /// Context for a failed create
    pub fn create(resource_type: ResourceType, record_data: Option<&RecordData>) -> Self {
        Self {
            operation: CrudOperation::Create,
            resource_type,
            record_data: record_data.cloned(),
            record_id: None,
        }
    }

    /// Context for a failed update
    pub fn update(
        resource_type: ResourceType,
        record_data: Option<&RecordData>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            operation: CrudOperation::Update,
            resource_type,
            record_data: record_data.cloned(),
            record_id: Some(record_id.into()),
        }
    }

    /// Options for fetching the metadata relevant to this payload
    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions {
            object: None,
            record_data: self.record_data.clone(),
        }
    }

    /// Field value from the payload, looking inside a nested `values` map too
    pub fn field(&self, name: &str) -> Option<&Value> {
        let data = self.record_data.as_ref()?;
        data.get(name).or_else(|| {
            data.get("values")
                .and_then(Value::as_object)
                .and_then(|values| values.get(name))
        })
    }

    /// Names of the fields present in the payload
    pub fn field_names(&self) -> Vec<&str> {
        let Some(data) = self.record_data.as_ref() else {
            return Vec::new();
        };

        let nested = data.get("values").and_then(Value::as_object);
        data.keys()
            .filter(|key| nested.is_none() || key.as_str() != "values")
            .chain(nested.into_iter().flat_map(|values| values.keys()))
            .map(String::as_str)
            .collect()
    }
}
