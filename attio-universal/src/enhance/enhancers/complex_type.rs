use super::{contains_any, QuotedTokens};
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use crate::metadata::{AttributeType, MetadataResolver};
use async_trait::async_trait;

const SHAPE_PROBLEMS: [&str; 9] = [
    "invalid value",
    "invalid format",
    "invalid type",
    "expected",
    "must be",
    "malformed",
    "wrong type",
    "type mismatch",
    "shape",
];

/// Structured attribute types with a fixed value shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexType {
    /// Postal address
    Location,
    /// First, last and full name
    PersonalName,
    /// Phone number
    PhoneNumber,
    /// Email address
    EmailAddress,
    /// Web domain
    Domain,
    /// Monetary amount
    Currency,
    /// Link to another record
    RecordReference,
}

impl ComplexType {
    /// Keywords that identify the type in an error message
    ///
    /// Record references are deliberately absent: errors naming them are
    /// left for the record reference enhancer unless metadata says otherwise.
    const KEYWORDS: [(ComplexType, &'static [&'static str]); 6] = [
        (ComplexType::Location, &["location", "address line", "postcode"]),
        (
            ComplexType::PersonalName,
            &["personal-name", "personal_name", "personal name", "first_name", "last_name"],
        ),
        (ComplexType::PhoneNumber, &["phone"]),
        (
            ComplexType::EmailAddress,
            &["email-address", "email_address", "email address"],
        ),
        (ComplexType::Currency, &["currency"]),
        (ComplexType::Domain, &["domain"]),
    ];

    /// Type named in an error message, first keyword match wins
    pub fn from_message(message: &str) -> Option<Self> {
        Self::KEYWORDS
            .iter()
            .find(|(_, keywords)| contains_any(message, keywords))
            .map(|(complex, _)| *complex)
    }

    /// Complex type of an attribute type, if it has one
    pub fn from_attribute_type(attribute_type: &AttributeType) -> Option<Self> {
        match attribute_type {
            AttributeType::Location => Some(ComplexType::Location),
            AttributeType::PersonalName => Some(ComplexType::PersonalName),
            AttributeType::PhoneNumber => Some(ComplexType::PhoneNumber),
            AttributeType::EmailAddress => Some(ComplexType::EmailAddress),
            AttributeType::Domain => Some(ComplexType::Domain),
            AttributeType::Currency => Some(ComplexType::Currency),
            AttributeType::RecordReference => Some(ComplexType::RecordReference),
            _ => None,
        }
    }

    /// Human label
    pub fn label(&self) -> &'static str {
        match self {
            ComplexType::Location => "location",
            ComplexType::PersonalName => "personal name",
            ComplexType::PhoneNumber => "phone number",
            ComplexType::EmailAddress => "email address",
            ComplexType::Domain => "domain",
            ComplexType::Currency => "currency",
            ComplexType::RecordReference => "record reference",
        }
    }

    /// Example of an accepted value
    pub fn example(&self) -> &'static str {
        match self {
            ComplexType::Location => {
                r#"{"line_1": "1 Market St", "locality": "San Francisco", "region": "CA", "postcode": "94105", "country_code": "US"}"#
            }
            ComplexType::PersonalName => {
                r#"{"first_name": "Jane", "last_name": "Doe", "full_name": "Jane Doe"}"#
            }
            ComplexType::PhoneNumber => {
                r#"[{"original_phone_number": "+14155550100", "country_code": "US"}]"#
            }
            ComplexType::EmailAddress => r#"["jane@example.com"]"#,
            ComplexType::Domain => r#"["example.com"]"#,
            ComplexType::Currency => r#"{"currency_value": 1500, "currency_code": "USD"}"#,
            ComplexType::RecordReference => {
                r#"[{"target_object": "companies", "target_record_id": "<record id>"}]"#
            }
        }
    }

    /// Additional rules that are easy to get wrong
    pub fn notes(&self) -> &'static str {
        match self {
            ComplexType::Location => {
                "All address keys are optional but must be strings; use a two-letter ISO country code."
            }
            ComplexType::PersonalName => {
                "Provide first_name and last_name; full_name is derived when omitted."
            }
            ComplexType::PhoneNumber => {
                "Numbers must be in E.164 format, starting with + and the country calling code."
            }
            ComplexType::EmailAddress => {
                "Pass an array of address strings, or objects with an email_address key."
            }
            ComplexType::Domain => {
                "Pass bare domains without protocol or path (example.com, not https://example.com/)."
            }
            ComplexType::Currency => {
                "currency_value must be a number; currency_code is a three-letter ISO 4217 code."
            }
            ComplexType::RecordReference => {
                "The referenced record must already exist; pass its record id, not its name."
            }
        }
    }
}

/// Describes the expected shape of structured values
pub struct ComplexTypeEnhancer {
    resolver: MetadataResolver,
    tokens: QuotedTokens,
}

impl ComplexTypeEnhancer {
    /// Create the enhancer
    pub fn new(resolver: MetadataResolver) -> Result<Self> {
        Ok(Self {
            resolver,
            tokens: QuotedTokens::new()?,
        })
    }
}

#[async_trait]
impl Enhancer for ComplexTypeEnhancer {
    fn name(&self) -> &'static str {
        "complex-type"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::ComplexType
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        Ok(contains_any(&error.message, &SHAPE_PROBLEMS)
            && (ComplexType::from_message(&error.message).is_some()
                || !self.tokens.extract(&error.message).is_empty()))
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

        let from_metadata = self
            .tokens
            .extract(&error.message)
            .into_iter()
            .find_map(|token| {
                let attribute = metadata.find(&token)?;
                ComplexType::from_attribute_type(&attribute.attribute_type)
                    .map(|complex| (complex, attribute.slug.clone()))
            });

        let (complex, attribute) = match from_metadata {
            Some((complex, slug)) => (complex, Some(slug)),
            None => match ComplexType::from_message(&error.message) {
                Some(complex) => (complex, None),
                None => return Ok(None),
            },
        };

        let subject = match attribute {
            Some(slug) => format!("Invalid {} value for \"{}\".", complex.label(), slug),
            None => format!("Invalid {} value.", complex.label()),
        };

        Ok(Some(format!(
            "{subject}\n\nExpected format: {}\n\n{}",
            complex.example(),
            complex.notes()
        )))
    }
}
