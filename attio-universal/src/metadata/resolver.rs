use super::cache::{MetadataCache, MetadataKey};
use super::{MetadataFetchResult, MetadataOptions, RawAttributeList};
use crate::config::Config;
use crate::error::{RemoteError, Result};
use crate::resource::ResourceType;
use async_trait::async_trait;
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, OnceLock};

/// Source of raw attribute schemas
#[async_trait]
pub trait AttributeLoader: Send + Sync {
    /// Load the attributes of a resource type, qualified by `object` for
    /// generic records and deals
    async fn load_attributes(
        &self,
        resource_type: ResourceType,
        object: Option<&str>,
    ) -> std::result::Result<RawAttributeList, RemoteError>;
}

/// How a failed metadata fetch is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Authorization or schema failure, propagated to the caller
    Critical,
    /// Anything else, replaced by an empty result
    Transient,
}

const AUTH_MARKERS: [&str; 2] = ["unauthorized", "forbidden"];

const SCHEMA_MARKERS: [&str; 2] = ["validation", "schema"];

static AUTH_STATUS_CODE: OnceLock<Option<Regex>> = OnceLock::new();

fn mentions_auth_status(message: &str) -> bool {
    AUTH_STATUS_CODE
        .get_or_init(|| Regex::new(r"\b40[13]\b").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(message))
}

/// Whether a remote failure is an authentication or authorization failure
///
/// Status 401 or 403 counts, as does a message saying unauthorized or
/// forbidden or naming 401/403 as a standalone number.
pub fn is_auth_failure(error: &RemoteError) -> bool {
    if matches!(error.status, Some(401) | Some(403)) {
        return true;
    }

    let message = error.message.to_lowercase();
    AUTH_MARKERS.iter().any(|marker| message.contains(marker)) || mentions_auth_status(&message)
}

/// Classify a loader failure
///
/// Authorization failures (see [`is_auth_failure`]) and messages mentioning
/// validation or schema problems are critical. Errors without a message are
/// transient.
pub fn classify_failure(error: &RemoteError) -> FailureClass {
    if is_auth_failure(error) {
        return FailureClass::Critical;
    }

    let message = error.message.to_lowercase();
    if SCHEMA_MARKERS.iter().any(|marker| message.contains(marker)) {
        FailureClass::Critical
    } else {
        FailureClass::Transient
    }
}

/// Cache-backed attribute metadata resolver
///
/// Successful loads are cached per (resource type, object qualifier).
/// Failures are never cached: a transient failure returns an empty result
/// and the next fetch tries the loader again.
#[derive(Clone)]
pub struct MetadataResolver {
    loader: Arc<dyn AttributeLoader>,
    cache: Arc<MetadataCache>,
}

impl MetadataResolver {
    /// Create a resolver with a cache sized from the global configuration
    pub fn new(loader: Arc<dyn AttributeLoader>) -> Self {
        Self::with_cache(loader, Arc::new(MetadataCache::from_config(Config::global())))
    }

    /// Create a resolver sharing an existing cache
    pub fn with_cache(loader: Arc<dyn AttributeLoader>, cache: Arc<MetadataCache>) -> Self {
        Self { loader, cache }
    }

    /// The underlying cache
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Fetch attribute metadata through the configured loader
    pub async fn fetch_metadata(
        &self,
        resource_type: ResourceType,
        options: &MetadataOptions,
    ) -> Result<MetadataFetchResult> {
        let key = MetadataKey::new(resource_type, options);
        let object = key.object.clone();
        let loader = Arc::clone(&self.loader);

        self.resolve(key, move || async move {
            loader
                .load_attributes(resource_type, object.as_deref())
                .await
        })
        .await
    }

    /// Fetch attribute metadata through a one-off loader
    ///
    /// The loader is only invoked on a cache miss.
    pub async fn fetch_metadata_with<F, Fut>(
        &self,
        resource_type: ResourceType,
        options: &MetadataOptions,
        loader: F,
    ) -> Result<MetadataFetchResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<RawAttributeList, RemoteError>>,
    {
        self.resolve(MetadataKey::new(resource_type, options), loader)
            .await
    }

    /// Fetch metadata, treating every failure as "no metadata"
    ///
    /// Used by the enhancers, which must never fail because of metadata.
    pub async fn fetch_metadata_lenient(
        &self,
        resource_type: ResourceType,
        options: &MetadataOptions,
    ) -> MetadataFetchResult {
        match self.fetch_metadata(resource_type, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!("Metadata unavailable for {}: {}", resource_type, e);
                MetadataFetchResult::empty()
            }
        }
    }

    /// Drop cached metadata for one resource type, or everything
    pub fn clear_cache(&self, resource_type: Option<ResourceType>) {
        match resource_type {
            Some(resource_type) => {
                let removed = self.cache.invalidate(resource_type);
                tracing::debug!("Cleared {} metadata entries for {}", removed, resource_type);
            }
            None => {
                self.cache.clear();
                tracing::debug!("Cleared metadata cache");
            }
        }
    }

    async fn resolve<F, Fut>(&self, key: MetadataKey, loader: F) -> Result<MetadataFetchResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<RawAttributeList, RemoteError>>,
    {
        if let Some(attributes) = self.cache.get(&key) {
            tracing::trace!("Metadata cache hit for {}", key);
            return Ok(MetadataFetchResult::from_attributes(attributes, true));
        }

        match loader().await {
            Ok(raw) => {
                let attributes = Arc::new(raw.into_attribute_map());
                tracing::debug!("Loaded {} attributes for {}", attributes.len(), key);
                self.cache.put(key, Arc::clone(&attributes));
                Ok(MetadataFetchResult::from_attributes(attributes, false))
            }
            Err(error) => match classify_failure(&error) {
                FailureClass::Critical => {
                    tracing::error!("Critical metadata failure for {}: {}", key, error);
                    Err(error.into())
                }
                FailureClass::Transient => {
                    tracing::warn!("Metadata unavailable for {}, continuing without it: {}", key, error);
                    Ok(MetadataFetchResult::empty())
                }
            },
        }
    }
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttributeLoader for CountingLoader {
        async fn load_attributes(
            &self,
            _resource_type: ResourceType,
            object: Option<&str>,
        ) -> std::result::Result<RawAttributeList, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawAttributeList::new(vec![json!({
                "api_slug": object.unwrap_or("name"),
                "title": "Title",
                "type": "text"
            })]))
        }
    }

    fn resolver() -> (MetadataResolver, Arc<CountingLoader>) {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MetadataCache::new(Duration::from_secs(60), 16));
        (MetadataResolver::with_cache(loader.clone(), cache), loader)
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(&RemoteError::with_status(401, "nope")),
            FailureClass::Critical
        );
        assert_eq!(
            classify_failure(&RemoteError::with_status(403, "nope")),
            FailureClass::Critical
        );
        for message in [
            "Unauthorized",
            "request Forbidden",
            "HTTP 401",
            "status 403",
            "Validation failed",
            "Schema mismatch",
        ] {
            assert_eq!(
                classify_failure(&RemoteError::new(message)),
                FailureClass::Critical,
                "{message}"
            );
        }
        assert_eq!(
            classify_failure(&RemoteError::new("Network timeout")),
            FailureClass::Transient
        );
        assert_eq!(
            classify_failure(&RemoteError::with_status(500, "Internal error")),
            FailureClass::Transient
        );
        assert_eq!(classify_failure(&RemoteError::opaque()), FailureClass::Transient);
    }

    #[test]
    fn test_status_codes_only_match_as_whole_numbers() {
        for message in ["Network timeout after 4013ms", "retry after 1403 ms", "id 40123"] {
            assert_eq!(
                classify_failure(&RemoteError::new(message)),
                FailureClass::Transient,
                "{message}"
            );
            assert!(!is_auth_failure(&RemoteError::new(message)), "{message}");
        }
        assert!(is_auth_failure(&RemoteError::new("401 Unauthorized")));
        assert!(is_auth_failure(&RemoteError::new("upstream said 403")));
        assert!(is_auth_failure(&RemoteError::with_status(403, "")));
        assert!(!is_auth_failure(&RemoteError::new("Schema mismatch")));
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let (resolver, loader) = resolver();
        let options = MetadataOptions::default();

        let first = resolver
            .fetch_metadata(ResourceType::Companies, &options)
            .await
            .unwrap();
        let second = resolver
            .fetch_metadata(ResourceType::Companies, &options)
            .await
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.metadata_map, second.metadata_map);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_object_qualifier_separates_entries() {
        let (resolver, loader) = resolver();

        let vendors = resolver
            .fetch_metadata(ResourceType::Records, &MetadataOptions::for_object("vendors"))
            .await
            .unwrap();
        let partners = resolver
            .fetch_metadata(ResourceType::Records, &MetadataOptions::for_object("partners"))
            .await
            .unwrap();

        assert!(vendors.metadata_map.contains_key("vendors"));
        assert!(partners.metadata_map.contains_key("partners"));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_returns_empty_and_is_not_cached() {
        let (resolver, _) = resolver();
        let options = MetadataOptions::default();

        let result = resolver
            .fetch_metadata_with(ResourceType::People, &options, || async {
                Err(RemoteError::new("Network timeout"))
            })
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.available_attributes.is_empty());
        assert!(!result.from_cache);

        let retry = resolver
            .fetch_metadata(ResourceType::People, &options)
            .await
            .unwrap();
        assert!(!retry.from_cache);
        assert!(!retry.is_empty());
    }

    #[tokio::test]
    async fn test_critical_failure_propagates_original_error() {
        let (resolver, _) = resolver();

        let err = resolver
            .fetch_metadata_with(ResourceType::Tasks, &MetadataOptions::default(), || async {
                Err(RemoteError::with_status(403, "Forbidden"))
            })
            .await
            .unwrap_err();

        let remote = err.as_remote().unwrap();
        assert_eq!(remote.status, Some(403));
        assert_eq!(remote.message, "Forbidden");
    }

    #[tokio::test]
    async fn test_loader_not_invoked_on_hit() {
        let (resolver, _) = resolver();
        let options = MetadataOptions::default();
        resolver
            .fetch_metadata(ResourceType::Notes, &options)
            .await
            .unwrap();

        let invoked = AtomicUsize::new(0);
        let result = resolver
            .fetch_metadata_with(ResourceType::Notes, &options, || {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok(RawAttributeList::default()) }
            })
            .await
            .unwrap();

        assert!(result.from_cache);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (resolver, loader) = resolver();
        let options = MetadataOptions::default();

        resolver.fetch_metadata(ResourceType::Lists, &options).await.unwrap();
        resolver.clear_cache(Some(ResourceType::Lists));
        resolver.fetch_metadata(ResourceType::Lists, &options).await.unwrap();
        resolver.clear_cache(None);
        resolver.fetch_metadata(ResourceType::Lists, &options).await.unwrap();

        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }
}
