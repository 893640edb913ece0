//! Enhancer strategies, one per class of upstream error

use crate::error::{Result, UniversalError};
use regex::Regex;

mod attribute_not_found;
mod complex_type;
mod record_reference;
mod required_fields;
mod select_option;
mod uniqueness;

pub use attribute_not_found::AttributeNotFoundEnhancer;
pub use complex_type::{ComplexType, ComplexTypeEnhancer};
pub use record_reference::RecordReferenceEnhancer;
pub use required_fields::RequiredFieldsEnhancer;
pub use select_option::SelectOptionEnhancer;
pub use uniqueness::UniquenessEnhancer;

/// Case-insensitive check for any of `needles` (which must be lower case)
pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Pulls quoted names and values out of error messages
#[derive(Debug, Clone)]
pub(crate) struct QuotedTokens {
    pattern: Regex,
}

impl QuotedTokens {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r#"["`“]([^"`“”]{1,128})["`”]|'([^'\s]{1,128})'"#).map_err(
                |e| UniversalError::Other(format!("Failed to compile quoted token regex: {e}")),
            )?,
        })
    }

    /// Quoted tokens in order of appearance
    pub(crate) fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|token| !token.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_any_ignores_case() {
        assert!(contains_any("Uniqueness Constraint violated", &["uniqueness constraint"]));
        assert!(!contains_any("Record not found", &["duplicate"]));
    }

    #[test]
    fn test_quoted_tokens() {
        let tokens = QuotedTokens::new().unwrap();
        assert_eq!(
            tokens.extract(r#"Cannot find attribute with slug/ID "compny_name"."#),
            vec!["compny_name"]
        );
        assert_eq!(
            tokens.extract("Invalid value 'Hot' for attribute `stage`"),
            vec!["Hot", "stage"]
        );
        assert!(tokens.extract("the record doesn't exist").is_empty());
    }
}
