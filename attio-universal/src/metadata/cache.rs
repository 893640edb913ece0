use super::{AttributeMap, MetadataOptions};
use crate::config::Config;
use crate::resource::ResourceType;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Cache key: resource type plus optional object qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    /// Resource type the attributes belong to
    pub resource_type: ResourceType,
    /// Sub-type qualifier, for generic records and deals
    pub object: Option<String>,
}

impl MetadataKey {
    /// Build the key a fetch with `options` would use
    pub fn new(resource_type: ResourceType, options: &MetadataOptions) -> Self {
        Self {
            resource_type,
            object: options.qualifier(resource_type),
        }
    }
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.object {
            Some(object) => write!(f, "{}:{}", self.resource_type, object),
            None => write!(f, "{}", self.resource_type),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    attributes: Arc<AttributeMap>,
    inserted_at: Instant,
    last_access: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// In-memory attribute schema cache with per-entry TTL
///
/// Entries expire a fixed time after insertion; reads do not extend them.
/// When full, the least recently read entry is evicted.
#[derive(Debug)]
pub struct MetadataCache {
    entries: DashMap<MetadataKey, CacheEntry>,
    ttl: Duration,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Create a cache with the given default TTL and capacity
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache sized from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.metadata_cache_ttl_seconds),
            config.metadata_cache_max_size,
        )
    }

    /// Default time-to-live for new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry, dropping it if it has expired
    pub fn get(&self, key: &MetadataKey) -> Option<Arc<AttributeMap>> {
        let now = Instant::now();

        let expired = match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.attributes));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            tracing::debug!("Metadata cache entry for {} expired", key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert with the default TTL
    pub fn put(&self, key: MetadataKey, attributes: Arc<AttributeMap>) {
        self.put_with_ttl(key, attributes, self.ttl);
    }

    /// Insert with an explicit TTL
    pub fn put_with_ttl(&self, key: MetadataKey, attributes: Arc<AttributeMap>, ttl: Duration) {
        let now = Instant::now();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict(now);
        }

        self.entries.insert(
            key,
            CacheEntry {
                attributes,
                inserted_at: now,
                last_access: now,
                ttl,
            },
        );
    }

    /// Drop every entry for a resource type, whatever its qualifier
    pub fn invalidate(&self, resource_type: ResourceType) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.resource_type != resource_type);
        before.saturating_sub(self.entries.len())
    }

    /// Drop a single entry
    pub fn invalidate_key(&self, key: &MetadataKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset hit and miss counters
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Current statistics
    pub fn stats(&self) -> MetadataCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        MetadataCacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            size: self.entries.len(),
            max_size: self.max_size,
        }
    }

    fn evict(&self, now: Instant) {
        if self.purge_expired() > 0 {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            tracing::debug!(
                "Evicting metadata for {} (idle {:?})",
                key,
                self.entries
                    .get(&key)
                    .map(|entry| now.duration_since(entry.last_access))
                    .unwrap_or_default()
            );
            self.entries.remove(&key);
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::from_config(Config::global())
    }
}

/// Metadata cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
    /// Hits over total lookups
    pub hit_rate: f64,
    /// Stored entries
    pub size: usize,
    /// Capacity
    pub max_size: usize,
}
