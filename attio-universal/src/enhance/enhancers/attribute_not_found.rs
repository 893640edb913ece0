use super::{contains_any, QuotedTokens};
use crate::enhance::{CrudErrorContext, Enhancer, ErrorKind};
use crate::error::{RemoteError, Result};
use crate::metadata::{AttributeMetadata, MetadataFetchResult, MetadataResolver};
use async_trait::async_trait;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

const PATTERNS: [&str; 6] = [
    "cannot find attribute",
    "attribute not found",
    "unknown attribute",
    "invalid attribute",
    "attribute does not exist",
    "no such attribute",
];

const MAX_SUGGESTIONS: usize = 3;
const MAX_LISTED_ATTRIBUTES: usize = 20;

/// Suggests real attributes for an unknown attribute slug
pub struct AttributeNotFoundEnhancer {
    resolver: MetadataResolver,
    tokens: QuotedTokens,
    matcher: SkimMatcherV2,
}

impl AttributeNotFoundEnhancer {
    /// Create the enhancer
    pub fn new(resolver: MetadataResolver) -> Result<Self> {
        Ok(Self {
            resolver,
            tokens: QuotedTokens::new()?,
            matcher: SkimMatcherV2::default(),
        })
    }

    fn normalize(name: &str) -> String {
        name.trim().to_lowercase().replace(['_', '-'], " ")
    }

    fn score(&self, attribute: &AttributeMetadata, query: &str) -> Option<i64> {
        attribute
            .lookup_strings()
            .filter_map(|candidate| {
                let candidate = Self::normalize(&candidate);
                let forward = self.matcher.fuzzy_match(&candidate, query);
                let backward = self.matcher.fuzzy_match(query, &candidate);
                forward
                    .max(backward)
                    .or_else(|| bigram_score(&candidate, query))
            })
            .max()
    }

    /// Up to three attribute slugs resembling `unknown`, best first
    pub fn suggest(&self, unknown: &str, metadata: &MetadataFetchResult) -> Vec<String> {
        let query = Self::normalize(unknown);
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(i64, &str)> = metadata
            .metadata_map
            .values()
            .filter(|attribute| !attribute.answers_to(unknown))
            .filter_map(|attribute| {
                self.score(attribute, &query)
                    .map(|score| (score, attribute.slug.as_str()))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, slug)| slug.to_string())
            .collect()
    }

    fn unknown_attributes(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
        metadata: &MetadataFetchResult,
    ) -> Vec<String> {
        if let Some(named) = self.tokens.extract(&error.message).into_iter().next() {
            return vec![named];
        }

        if metadata.is_empty() {
            return Vec::new();
        }

        context
            .field_names()
            .into_iter()
            .filter(|name| !matches!(*name, "object" | "object_api_slug"))
            .filter(|name| metadata.find(name).is_none())
            .map(str::to_string)
            .collect()
    }
}

/// Dice coefficient over character bigrams, scaled to 0..=100
///
/// Catches transpositions and substitutions ("domainz", "naem") that a
/// subsequence matcher rejects. Returns `None` below 0.5.
fn bigram_score(a: &str, b: &str) -> Option<i64> {
    fn bigrams(s: &str) -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    }

    let left = bigrams(a);
    let mut right = bigrams(b);
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let total = left.len() + right.len();
    let mut shared = 0;
    for pair in &left {
        if let Some(pos) = right.iter().position(|other| other == pair) {
            right.swap_remove(pos);
            shared += 1;
        }
    }

    let score = (200 * shared / total) as i64;
    (score >= 50).then_some(score)
}

#[async_trait]
impl Enhancer for AttributeNotFoundEnhancer {
    fn name(&self) -> &'static str {
        "attribute-not-found"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::AttributeNotFound
    }

    fn matches(&self, error: &RemoteError, _context: &CrudErrorContext) -> Result<bool> {
        let message = &error.message;
        Ok(contains_any(message, &PATTERNS)
            || (contains_any(message, &["attribute"])
                && contains_any(message, &["not found", "does not exist", "unknown"])))
    }

    async fn enhance(
        &self,
        error: &RemoteError,
        context: &CrudErrorContext,
    ) -> Result<Option<String>> {
        let resource_type = context.resource_type;
        let metadata = self
            .resolver
            .fetch_metadata_lenient(resource_type, &context.metadata_options())
            .await;
        let unknown = self.unknown_attributes(error, context, &metadata);

        let mut message = match unknown.as_slice() {
            [] => format!(
                "The record data references an attribute that does not exist on {resource_type}."
            ),
            [single] => format!("Attribute \"{single}\" does not exist on {resource_type}."),
            several => format!(
                "Attributes {} do not exist on {resource_type}.",
                several
                    .iter()
                    .map(|name| format!("\"{name}\""))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        if metadata.is_empty() {
            message.push_str(&format!(
                " Check the attribute slug against the {resource_type} schema."
            ));
            return Ok(Some(message));
        }

        for name in &unknown {
            let suggestions = self.suggest(name, &metadata);
            if !suggestions.is_empty() {
                let prefix = if unknown.len() > 1 {
                    format!("\n\nInstead of \"{name}\", did you mean: ")
                } else {
                    "\n\nDid you mean: ".to_string()
                };
                message.push_str(&prefix);
                message.push_str(&suggestions.join(", "));
                message.push('?');
            }
        }

        let mut slugs: Vec<&str> = metadata.metadata_map.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        let listed = slugs.len().min(MAX_LISTED_ATTRIBUTES);
        message.push_str(&format!(
            "\n\nAvailable attributes: {}",
            slugs[..listed].join(", ")
        ));
        if slugs.len() > listed {
            message.push_str(&format!(" (and {} more)", slugs.len() - listed));
        }

        Ok(Some(message))
    }
}
