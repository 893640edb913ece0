//! Resource types and record payload helpers
//!
//! [`ResourceType`] is the dispatch key used by the metadata cache, the
//! enhancer chains and the batch executor. Record payloads are plain JSON
//! maps because every resource type has a different field shape.

use crate::error::{Result, UniversalError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A record payload as sent to or received from the remote API
pub type RecordData = serde_json::Map<String, Value>;

/// Object qualifier used for generic records when none is supplied
pub const DEFAULT_RECORDS_OBJECT: &str = "records";

/// Fixed object qualifier for deals
pub const DEALS_OBJECT: &str = "deals";

/// Record categories exposed by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Organizations
    Companies,
    /// Individuals
    People,
    /// Tasks
    Tasks,
    /// Collections of records
    Lists,
    /// Notes attached to records
    Notes,
    /// Deals
    Deals,
    /// Records of any custom object, qualified by an object slug
    Records,
}

impl ResourceType {
    /// Every resource type, in a stable order
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Companies,
        ResourceType::People,
        ResourceType::Tasks,
        ResourceType::Lists,
        ResourceType::Notes,
        ResourceType::Deals,
        ResourceType::Records,
    ];

    /// The wire name of this resource type
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Companies => "companies",
            ResourceType::People => "people",
            ResourceType::Tasks => "tasks",
            ResourceType::Lists => "lists",
            ResourceType::Notes => "notes",
            ResourceType::Deals => "deals",
            ResourceType::Records => "records",
        }
    }

    /// Singular noun for messages ("company", "person", ...)
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceType::Companies => "company",
            ResourceType::People => "person",
            ResourceType::Tasks => "task",
            ResourceType::Lists => "list",
            ResourceType::Notes => "note",
            ResourceType::Deals => "deal",
            ResourceType::Records => "record",
        }
    }

    /// Sub-type qualifier for metadata lookups
    ///
    /// Generic records take the explicit object, then the payload's `object`
    /// or `object_api_slug` field, then [`DEFAULT_RECORDS_OBJECT`]. Deals are
    /// always [`DEALS_OBJECT`]. Other types have no sub-type.
    pub fn object_qualifier(
        &self,
        explicit: Option<&str>,
        record: Option<&RecordData>,
    ) -> Option<String> {
        match self {
            ResourceType::Records => {
                let from_record = record.and_then(|data| {
                    ["object", "object_api_slug"]
                        .iter()
                        .find_map(|key| data.get(*key).and_then(Value::as_str))
                });
                let object = explicit
                    .filter(|s| !s.trim().is_empty())
                    .or(from_record.filter(|s| !s.trim().is_empty()))
                    .unwrap_or(DEFAULT_RECORDS_OBJECT);
                Some(object.to_string())
            }
            ResourceType::Deals => Some(DEALS_OBJECT.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = UniversalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "companies" | "company" | "organizations" => Ok(ResourceType::Companies),
            "people" | "person" | "individuals" => Ok(ResourceType::People),
            "tasks" | "task" => Ok(ResourceType::Tasks),
            "lists" | "list" | "collections" => Ok(ResourceType::Lists),
            "notes" | "note" => Ok(ResourceType::Notes),
            "deals" | "deal" => Ok(ResourceType::Deals),
            "records" | "record" => Ok(ResourceType::Records),
            other => Err(UniversalError::InvalidInput(format!(
                "Unknown resource type '{other}'. Expected one of: {}",
                ResourceType::ALL
                    .iter()
                    .map(ResourceType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Identifier of a record as returned by the remote API
///
/// Records carry their id either as a plain string or as an object such as
/// `{"record_id": "..."}` or `{"task_id": "..."}`. The probes are tried in order.
pub fn record_id(record: &Value) -> Option<String> {
    const ID_KEYS: [&str; 5] = ["record_id", "task_id", "list_id", "note_id", "entry_id"];

    match record.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(id) => ID_KEYS
            .iter()
            .find_map(|key| id.get(*key).and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
