//! Attribute metadata resolution and caching
//!
//! Attribute schemas describe the fields a resource type accepts: their
//! slugs, titles, value types and, for select-like attributes, the options
//! that are valid. They are fetched through a caller-supplied
//! [`AttributeLoader`], cached per resource type and object qualifier, and
//! used to turn vague upstream errors into precise guidance.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use attio_universal::metadata::{MetadataOptions, MetadataResolver};
//! use attio_universal::ResourceType;
//! # use attio_universal::metadata::AttributeLoader;
//! # use std::sync::Arc;
//!
//! # async fn example(loader: Arc<dyn AttributeLoader>) -> attio_universal::Result<()> {
//! let resolver = MetadataResolver::new(loader);
//! let result = resolver
//!     .fetch_metadata(ResourceType::Companies, &MetadataOptions::default())
//!     .await?;
//!
//! for slug in result.metadata_map.keys() {
//!     println!("{slug}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, UniversalError};
use crate::resource::{RecordData, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Time-boxed attribute schema cache
pub mod cache;

/// Cache-backed resolver with failure classification
pub mod resolver;

pub use cache::{MetadataCache, MetadataCacheStats, MetadataKey};
pub use resolver::{
    classify_failure, is_auth_failure, AttributeLoader, FailureClass, MetadataResolver,
};

/// Attribute metadata keyed by attribute slug
pub type AttributeMap = HashMap<String, AttributeMetadata>;

/// Declared value type of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeType {
    /// Free text
    Text,
    /// Integer or decimal number
    Number,
    /// Calendar date
    Date,
    /// Date and time
    Timestamp,
    /// Boolean
    Checkbox,
    /// Monetary amount
    Currency,
    /// One or many options from a fixed set
    Select,
    /// Pipeline stage
    Status,
    /// Link to another record
    RecordReference,
    /// Email address
    EmailAddress,
    /// Web domain
    Domain,
    /// Phone number
    PhoneNumber,
    /// Postal location
    Location,
    /// First, last and full name
    PersonalName,
    /// Interaction timestamp and owner
    Interaction,
    /// Workspace member reference
    ActorReference,
    /// Star rating
    Rating,
    /// Anything this crate does not model
    Unknown,
}

impl AttributeType {
    /// Parse the API's type name, mapping unrecognized names to `Unknown`
    pub fn from_api(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "text" => AttributeType::Text,
            "number" => AttributeType::Number,
            "date" => AttributeType::Date,
            "timestamp" => AttributeType::Timestamp,
            "checkbox" => AttributeType::Checkbox,
            "currency" => AttributeType::Currency,
            "select" => AttributeType::Select,
            "status" => AttributeType::Status,
            "record-reference" => AttributeType::RecordReference,
            "email-address" => AttributeType::EmailAddress,
            "domain" => AttributeType::Domain,
            "phone-number" => AttributeType::PhoneNumber,
            "location" => AttributeType::Location,
            "personal-name" => AttributeType::PersonalName,
            "interaction" => AttributeType::Interaction,
            "actor-reference" => AttributeType::ActorReference,
            "rating" => AttributeType::Rating,
            _ => AttributeType::Unknown,
        }
    }

    /// Whether values must be chosen from a fixed option set
    pub fn is_select_like(&self) -> bool {
        matches!(self, AttributeType::Select | AttributeType::Status)
    }
}

/// One valid option of a select or status attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Remote option identifier
    pub id: Option<String>,
    /// Display title
    pub title: String,
    /// Machine value, when distinct from the title
    pub value: Option<String>,
    /// Archived options are rejected on write
    pub is_archived: bool,
}

impl SelectOption {
    /// Whether `candidate` names this option by title, value or id
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        self.title.eq_ignore_ascii_case(candidate)
            || self
                .value
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case(candidate))
            || self.id.as_deref() == Some(candidate)
    }
}

/// Schema of one remote field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Stable machine identifier
    pub slug: String,
    /// Human title, absent when the API sent a non-string title
    pub title: Option<String>,
    /// Declared value type
    pub attribute_type: AttributeType,
    /// Second slug the attribute answers to, when distinct
    pub alternate_slug: Option<String>,
    /// Must be supplied on create
    pub is_required: bool,
    /// Values must be unique across records
    pub is_unique: bool,
    /// Accepts several values
    pub is_multiselect: bool,
    /// Valid options for select-like attributes
    pub options: Vec<SelectOption>,
}

impl AttributeMetadata {
    /// Lower-cased strings this attribute can be looked up by
    pub fn lookup_strings(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(Some(self.slug.as_str()))
            .chain(std::iter::once(self.title.as_deref()))
            .chain(std::iter::once(
                self.alternate_slug
                    .as_deref()
                    .filter(|alt| *alt != self.slug),
            ))
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase)
    }

    /// Options that may still be written
    pub fn active_options(&self) -> impl Iterator<Item = &SelectOption> {
        self.options.iter().filter(|option| !option.is_archived)
    }

    /// Whether this attribute answers to `name` (slug, alternate slug or title)
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.lookup_strings().any(|candidate| candidate == name)
    }

    /// Convert one raw attribute as returned by the loader
    ///
    /// Non-string fields are skipped. Returns `None` when the attribute has
    /// no usable slug.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let api_slug = string_field(raw, "api_slug");
        let slug_field = string_field(raw, "slug");
        let slug = api_slug.clone().or_else(|| slug_field.clone())?;
        let alternate_slug = match (api_slug, slug_field) {
            (Some(api), Some(other)) if api != other => Some(other),
            _ => None,
        };

        let attribute_type = string_field(raw, "type")
            .map(|name| AttributeType::from_api(&name))
            .unwrap_or(AttributeType::Unknown);

        let options = ["options", "statuses"]
            .iter()
            .filter_map(|key| raw.get(*key).and_then(Value::as_array))
            .flatten()
            .filter_map(select_option_from_raw)
            .collect();

        Some(Self {
            slug,
            title: string_field(raw, "title"),
            attribute_type,
            alternate_slug,
            is_required: bool_field(raw, "is_required"),
            is_unique: bool_field(raw, "is_unique"),
            is_multiselect: bool_field(raw, "is_multiselect"),
            options,
        })
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn select_option_from_raw(raw: &Value) -> Option<SelectOption> {
    let title = string_field(raw, "title")?;
    let id = match raw.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Object(id)) => ["option_id", "status_id"]
            .iter()
            .find_map(|key| id.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    };

    Some(SelectOption {
        id,
        title,
        value: string_field(raw, "value"),
        is_archived: bool_field(raw, "is_archived"),
    })
}

/// Raw attribute list as resolved by a loader: `{ "data": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAttributeList {
    /// Raw attribute objects
    #[serde(default)]
    pub data: Vec<Value>,
}

impl RawAttributeList {
    /// Wrap raw attribute objects
    pub fn new(data: Vec<Value>) -> Self {
        Self { data }
    }

    /// Accept either `{ "data": [...] }` or a bare array
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(data) => Ok(Self { data }),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(data)) => Ok(Self { data }),
                Some(_) => Err(UniversalError::InvalidInput(
                    "Attribute payload field 'data' must be an array".to_string(),
                )),
                None => Ok(Self::default()),
            },
            other => Err(UniversalError::InvalidInput(format!(
                "Unexpected attribute payload: {other}"
            ))),
        }
    }

    /// Convert to an attribute map keyed by slug
    pub fn into_attribute_map(self) -> AttributeMap {
        let mut map = AttributeMap::with_capacity(self.data.len());
        for raw in &self.data {
            match AttributeMetadata::from_raw(raw) {
                Some(attribute) => {
                    map.insert(attribute.slug.clone(), attribute);
                }
                None => tracing::debug!("Skipping attribute without a slug: {}", raw),
            }
        }
        map
    }
}

/// Options for a metadata fetch
#[derive(Debug, Clone, Default)]
pub struct MetadataOptions {
    /// Object qualifier for generic records
    pub object: Option<String>,
    /// Record payload to read the object qualifier from
    pub record_data: Option<RecordData>,
}

impl MetadataOptions {
    /// Options naming an explicit object
    pub fn for_object(object: impl Into<String>) -> Self {
        Self {
            object: Some(object.into()),
            record_data: None,
        }
    }

    /// Options carrying a record payload
    pub fn for_record(record_data: &RecordData) -> Self {
        Self {
            object: None,
            record_data: Some(record_data.clone()),
        }
    }

    /// Sub-type qualifier for `resource_type`
    pub fn qualifier(&self, resource_type: ResourceType) -> Option<String> {
        resource_type.object_qualifier(self.object.as_deref(), self.record_data.as_ref())
    }
}

/// Outcome of a metadata fetch
///
/// Always well formed: a failed, non-critical fetch yields an empty map and
/// an empty attribute list rather than an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFetchResult {
    /// Attribute metadata keyed by slug
    pub metadata_map: Arc<AttributeMap>,
    /// Every lookup string across all attributes, lower-cased and deduplicated
    pub available_attributes: Vec<String>,
    /// Whether the map came from the cache
    pub from_cache: bool,
}

impl MetadataFetchResult {
    /// Build a result from an attribute map
    pub fn from_attributes(metadata_map: Arc<AttributeMap>, from_cache: bool) -> Self {
        let available_attributes = metadata_map
            .values()
            .flat_map(AttributeMetadata::lookup_strings)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            metadata_map,
            available_attributes,
            from_cache,
        }
    }

    /// The result used when metadata is unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no attributes are known
    pub fn is_empty(&self) -> bool {
        self.metadata_map.is_empty()
    }

    /// Find an attribute by slug, alternate slug or title
    pub fn find(&self, name: &str) -> Option<&AttributeMetadata> {
        self.metadata_map
            .get(name)
            .or_else(|| self.metadata_map.values().find(|attr| attr.answers_to(name)))
    }

    /// Required attributes, sorted by slug
    pub fn required_attributes(&self) -> Vec<&AttributeMetadata> {
        let mut required: Vec<_> = self
            .metadata_map
            .values()
            .filter(|attr| attr.is_required)
            .collect();
        required.sort_by(|a, b| a.slug.cmp(&b.slug));
        required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_attributes() -> RawAttributeList {
        RawAttributeList::new(vec![
            json!({
                "api_slug": "name",
                "title": "Company Name",
                "type": "text",
                "is_required": true
            }),
            json!({
                "api_slug": "domains",
                "slug": "domain",
                "title": "Domains",
                "type": "domain",
                "is_unique": true,
                "is_multiselect": true
            }),
            json!({
                "api_slug": "stage",
                "title": 42,
                "type": "status",
                "statuses": [
                    {"id": {"status_id": "s1"}, "title": "Lead", "is_archived": false},
                    {"id": {"status_id": "s2"}, "title": "Dormant", "is_archived": true}
                ]
            }),
            json!({"title": "No slug at all", "type": "text"}),
        ])
    }

    #[test]
    fn test_convert_skips_attributes_without_slug() {
        let map = raw_attributes().into_attribute_map();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("name"));
        assert!(map.contains_key("domains"));
        assert!(map.contains_key("stage"));
    }

    #[test]
    fn test_convert_reads_types_flags_and_options() {
        let map = raw_attributes().into_attribute_map();

        let domains = &map["domains"];
        assert_eq!(domains.attribute_type, AttributeType::Domain);
        assert_eq!(domains.alternate_slug.as_deref(), Some("domain"));
        assert!(domains.is_unique);
        assert!(domains.is_multiselect);

        let stage = &map["stage"];
        assert!(stage.attribute_type.is_select_like());
        assert_eq!(stage.title, None);
        assert_eq!(stage.options.len(), 2);
        assert_eq!(stage.options[0].id.as_deref(), Some("s1"));
        let active: Vec<_> = stage.active_options().map(|o| o.title.as_str()).collect();
        assert_eq!(active, vec!["Lead"]);
    }

    #[test]
    fn test_available_attributes_are_flattened_and_deduplicated() {
        let result =
            MetadataFetchResult::from_attributes(Arc::new(raw_attributes().into_attribute_map()), false);

        assert_eq!(
            result.available_attributes,
            vec!["company name", "domain", "domains", "name", "stage"]
        );
    }

    #[test]
    fn test_find_by_title_and_alternate_slug() {
        let result =
            MetadataFetchResult::from_attributes(Arc::new(raw_attributes().into_attribute_map()), true);

        assert_eq!(result.find("Company Name").map(|a| a.slug.as_str()), Some("name"));
        assert_eq!(result.find("domain").map(|a| a.slug.as_str()), Some("domains"));
        assert!(result.find("missing").is_none());
        assert_eq!(result.required_attributes().len(), 1);
    }

    #[test]
    fn test_raw_attribute_list_shapes() {
        let wrapped = RawAttributeList::from_value(json!({"data": [{"api_slug": "a"}]})).unwrap();
        assert_eq!(wrapped.data.len(), 1);

        let bare = RawAttributeList::from_value(json!([{"api_slug": "a"}, {"api_slug": "b"}])).unwrap();
        assert_eq!(bare.data.len(), 2);

        let missing = RawAttributeList::from_value(json!({})).unwrap();
        assert!(missing.data.is_empty());

        assert!(RawAttributeList::from_value(json!({"data": "nope"})).is_err());
        assert!(RawAttributeList::from_value(json!(7)).is_err());
    }

    #[test]
    fn test_select_option_matching() {
        let option = SelectOption {
            id: Some("opt-1".to_string()),
            title: "Closed Won".to_string(),
            value: Some("closed_won".to_string()),
            is_archived: false,
        };
        assert!(option.matches("closed won"));
        assert!(option.matches("CLOSED_WON"));
        assert!(option.matches("opt-1"));
        assert!(!option.matches("won"));
    }

    #[test]
    fn test_attribute_type_from_api() {
        assert_eq!(AttributeType::from_api("record-reference"), AttributeType::RecordReference);
        assert_eq!(AttributeType::from_api("personal_name"), AttributeType::PersonalName);
        assert_eq!(AttributeType::from_api("hologram"), AttributeType::Unknown);
    }
}
