//! Shared fixtures for unit tests
//!
//! Resolvers here always get their own cache, so tests never observe
//! each other's cached schemas.

use crate::config::Config;
use crate::error::RemoteError;
use crate::metadata::{MetadataCache, MetadataResolver};
use crate::operations::{MockBackendConfig, MockRecordBackend};
use std::sync::{Arc, Once};
use tokio::time::Duration;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, honouring `RUST_LOG`
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Configuration with built-in defaults, untouched by the environment
pub fn test_config() -> Config {
    Config::default()
}

fn fresh_cache() -> Arc<MetadataCache> {
    Arc::new(MetadataCache::new(Duration::from_secs(60), 32))
}

/// Resolver serving the mock backend's standard schemas
pub fn fixture_resolver() -> MetadataResolver {
    init_test_tracing();
    MetadataResolver::with_cache(Arc::new(MockRecordBackend::new()), fresh_cache())
}

/// Resolver whose every schema request times out
pub fn unavailable_resolver() -> MetadataResolver {
    init_test_tracing();
    let backend = MockRecordBackend::new_with_config(MockBackendConfig {
        attribute_error: Some(RemoteError::new("Network timeout")),
        ..Default::default()
    });
    MetadataResolver::with_cache(Arc::new(backend), fresh_cache())
}
