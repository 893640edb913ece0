use super::{CrudErrorContext, EnhancedError, Enhancer, EnhancerRegistry};
use crate::error::{RemoteError, Result};
use crate::metadata::MetadataResolver;
use crate::operations::RecordLookup;
use crate::resource::{RecordData, ResourceType};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Runs failed create and update calls through the enhancer chains
///
/// Always produces an error: the first enhancement in chain order, or a
/// generic fallback embedding the original message. A misbehaving enhancer
/// (an `Err`, or a panic) is logged and skipped.
#[derive(Debug, Clone)]
pub struct ErrorEnhancementCoordinator {
    registry: EnhancerRegistry,
}

impl ErrorEnhancementCoordinator {
    /// Coordinator with the standard chains
    pub fn new(resolver: MetadataResolver, lookup: Arc<dyn RecordLookup>) -> Result<Self> {
        Ok(Self::with_registry(EnhancerRegistry::standard(
            resolver, lookup,
        )?))
    }

    /// Coordinator over a custom registry
    pub fn with_registry(registry: EnhancerRegistry) -> Self {
        Self { registry }
    }

    /// The enhancer chains in use
    pub fn registry(&self) -> &EnhancerRegistry {
        &self.registry
    }

    /// Classify a failed create
    pub async fn handle_create_error(
        &self,
        error: &RemoteError,
        resource_type: ResourceType,
        record_data: Option<&RecordData>,
    ) -> EnhancedError {
        self.enhance(error, &CrudErrorContext::create(resource_type, record_data))
            .await
    }

    /// Classify a failed update
    pub async fn handle_update_error(
        &self,
        error: &RemoteError,
        resource_type: ResourceType,
        record_data: Option<&RecordData>,
        record_id: &str,
    ) -> EnhancedError {
        self.enhance(
            error,
            &CrudErrorContext::update(resource_type, record_data, record_id),
        )
        .await
    }

    /// Classify an error under an explicit context
    pub async fn enhance(&self, error: &RemoteError, context: &CrudErrorContext) -> EnhancedError {
        for enhancer in self.registry.chain(context.operation) {
            if !enhancer.supports(context.resource_type) {
                continue;
            }

            if !Self::safe_matches(enhancer.as_ref(), error, context) {
                continue;
            }

            match AssertUnwindSafe(enhancer.enhance(error, context))
                .catch_unwind()
                .await
            {
                Ok(Ok(Some(message))) => {
                    tracing::debug!(
                        "{} error on {} enhanced by {}",
                        context.operation,
                        context.resource_type,
                        enhancer.name()
                    );
                    return EnhancedError::new(enhancer.error_kind(), message, error.clone());
                }
                Ok(Ok(None)) => {
                    tracing::trace!("Enhancer {} declined", enhancer.name());
                }
                Ok(Err(e)) => {
                    tracing::warn!("Enhancer {} failed: {}", enhancer.name(), e);
                }
                Err(_) => {
                    tracing::warn!("Enhancer {} panicked while enhancing", enhancer.name());
                }
            }
        }

        EnhancedError::fallback(context.operation, context.resource_type, error.clone())
    }

    fn safe_matches(enhancer: &dyn Enhancer, error: &RemoteError, context: &CrudErrorContext) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(|| enhancer.matches(error, context))) {
            Ok(Ok(matched)) => matched,
            Ok(Err(e)) => {
                tracing::warn!("Enhancer {} failed to match: {}", enhancer.name(), e);
                false
            }
            Err(_) => {
                tracing::warn!("Enhancer {} panicked while matching", enhancer.name());
                false
            }
        }
    }
}
