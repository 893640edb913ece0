//! Unique-field extraction from record payloads
//!
//! Payload shapes vary between resource types and callers, so candidate
//! unique values are found by trying an ordered list of named rules. The
//! first rule that yields a non-empty value wins.

use crate::resource::RecordData;
use serde_json::Value;

/// A named probe for one unique field shape
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    /// Rule name for logs
    pub name: &'static str,
    /// Payload key the rule reads
    pub key: &'static str,
    /// Attribute slug to search by when the rule matches
    pub field: &'static str,
    extract: fn(&Value) -> Option<String>,
}

impl ExtractionRule {
    /// Apply the rule to a payload map
    pub fn apply(&self, data: &RecordData) -> Option<String> {
        data.get(self.key)
            .and_then(self.extract)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// A unique value found in a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueFieldCandidate {
    /// Name of the rule that produced it
    pub rule: &'static str,
    /// Attribute slug to search by
    pub field: &'static str,
    /// The value itself
    pub value: String,
}

/// Probes tried in order when looking for a unique value
pub const UNIQUE_FIELD_RULES: [ExtractionRule; 4] = [
    ExtractionRule {
        name: "domains_array",
        key: "domains",
        field: "domains",
        extract: first_domain,
    },
    ExtractionRule {
        name: "domain_string",
        key: "domain",
        field: "domains",
        extract: as_string,
    },
    ExtractionRule {
        name: "email_addresses_array",
        key: "email_addresses",
        field: "email_addresses",
        extract: first_email,
    },
    ExtractionRule {
        name: "email_string",
        key: "email",
        field: "email_addresses",
        extract: as_string,
    },
];

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn first_in_array(value: &Value, object_key: &str) -> Option<String> {
    value.as_array()?.iter().find_map(|entry| match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get(object_key)
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

fn first_domain(value: &Value) -> Option<String> {
    first_in_array(value, "domain")
}

fn first_email(value: &Value) -> Option<String> {
    first_in_array(value, "email_address")
}

/// Find the first unique value in a payload
///
/// The top-level map is probed first, then a nested `values` map.
pub fn extract_unique_field(data: &RecordData) -> Option<UniqueFieldCandidate> {
    let nested = data.get("values").and_then(Value::as_object);

    std::iter::once(data)
        .chain(nested)
        .find_map(|map| {
            UNIQUE_FIELD_RULES.iter().find_map(|rule| {
                rule.apply(map).map(|value| UniqueFieldCandidate {
                    rule: rule.name,
                    field: rule.field,
                    value,
                })
            })
        })
}
