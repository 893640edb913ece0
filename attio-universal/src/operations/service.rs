use super::filters::validate_filters;
use super::{RecordBackend, RecordLookup, RecordOperations, SearchQuery};
use crate::common::validation_builders::quick;
use crate::config::Config;
use crate::enhance::ErrorEnhancementCoordinator;
use crate::error::{RemoteError, Result, UniversalError};
use crate::metadata::{is_auth_failure, AttributeLoader, MetadataResolver};
use crate::resource::{RecordData, ResourceType};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// [`RecordOperations`] over a [`RecordBackend`]
///
/// Create and update failures are classified by the enhancement pipeline.
/// Delete and get failures keep the upstream message and gain the resource
/// and record id. Search filters are validated against metadata first.
#[derive(Clone)]
pub struct UniversalRecordService {
    backend: Arc<dyn RecordBackend>,
    resolver: MetadataResolver,
    coordinator: ErrorEnhancementCoordinator,
    search_default_limit: usize,
    search_max_limit: usize,
}

impl UniversalRecordService {
    /// Service over a backend that also serves schemas and conflict lookups
    pub fn new<B>(backend: Arc<B>) -> Result<Self>
    where
        B: RecordBackend + AttributeLoader + RecordLookup + 'static,
    {
        let resolver = MetadataResolver::new(backend.clone());
        let coordinator = ErrorEnhancementCoordinator::new(resolver.clone(), backend.clone())?;
        Ok(Self::with_parts(backend, resolver, coordinator, Config::global()))
    }

    /// Service assembled from explicit parts
    pub fn with_parts(
        backend: Arc<dyn RecordBackend>,
        resolver: MetadataResolver,
        coordinator: ErrorEnhancementCoordinator,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            resolver,
            coordinator,
            search_default_limit: config.search_default_limit,
            search_max_limit: config.search_max_limit,
        }
    }

    /// The metadata resolver shared with the enhancers
    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    /// The error coordinator
    pub fn coordinator(&self) -> &ErrorEnhancementCoordinator {
        &self.coordinator
    }

    /// Effective limit for a query
    pub fn effective_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.search_default_limit),
            Some(0) => Err(quick::out_of_range("limit", 0, 1, self.search_max_limit)),
            Some(limit) => Ok(limit.min(self.search_max_limit)),
        }
    }

    fn require_id(operation: &str, resource_type: ResourceType, record_id: &str) -> Result<()> {
        if record_id.trim().is_empty() {
            return Err(quick::invalid_value(
                &format!("{operation} {resource_type}"),
                "record_id",
                record_id,
                "must not be blank",
            ));
        }
        Ok(())
    }

    fn with_record_context(
        operation: &str,
        resource_type: ResourceType,
        record_id: &str,
        error: RemoteError,
    ) -> UniversalError {
        UniversalError::Context {
            message: format!(
                "Failed to {} {} '{}': {}",
                operation,
                resource_type.singular(),
                record_id,
                error
            ),
            source: Box::new(error),
        }
    }
}

impl std::fmt::Debug for UniversalRecordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniversalRecordService")
            .field("resolver", &self.resolver)
            .field("coordinator", &self.coordinator)
            .field("search_default_limit", &self.search_default_limit)
            .field("search_max_limit", &self.search_max_limit)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordOperations for UniversalRecordService {
    async fn create_record(&self, resource_type: ResourceType, data: &RecordData) -> Result<Value> {
        if data.is_empty() {
            return Err(quick::required_field(
                &format!("create {resource_type}"),
                "record_data",
            ));
        }

        tracing::debug!("Creating {} record", resource_type);
        match self.backend.create(resource_type, data).await {
            Ok(record) => Ok(record),
            Err(error) if is_auth_failure(&error) => {
                tracing::warn!("Create {} rejected by authorization: {}", resource_type, error);
                Err(UniversalError::Remote(error))
            }
            Err(error) => Err(self
                .coordinator
                .handle_create_error(&error, resource_type, Some(data))
                .await
                .into()),
        }
    }

    async fn update_record(
        &self,
        resource_type: ResourceType,
        record_id: &str,
        data: &RecordData,
    ) -> Result<Value> {
        Self::require_id("update", resource_type, record_id)?;
        if data.is_empty() {
            return Err(quick::required_field(
                &format!("update {resource_type}"),
                "record_data",
            ));
        }

        tracing::debug!("Updating {} record {}", resource_type, record_id);
        match self.backend.update(resource_type, record_id, data).await {
            Ok(record) => Ok(record),
            Err(error) if is_auth_failure(&error) => {
                tracing::warn!(
                    "Update {} {} rejected by authorization: {}",
                    resource_type,
                    record_id,
                    error
                );
                Err(UniversalError::Remote(error))
            }
            Err(error) => Err(self
                .coordinator
                .handle_update_error(&error, resource_type, Some(data), record_id)
                .await
                .into()),
        }
    }

    async fn delete_record(&self, resource_type: ResourceType, record_id: &str) -> Result<Value> {
        Self::require_id("delete", resource_type, record_id)?;

        tracing::debug!("Deleting {} record {}", resource_type, record_id);
        self.backend
            .delete(resource_type, record_id)
            .await
            .map_err(|e| Self::with_record_context("delete", resource_type, record_id, e))?;

        Ok(json!({"success": true, "record_id": record_id}))
    }

    async fn get_record(&self, resource_type: ResourceType, record_id: &str) -> Result<Value> {
        Self::require_id("get", resource_type, record_id)?;

        self.backend
            .get(resource_type, record_id)
            .await
            .map_err(|e| Self::with_record_context("get", resource_type, record_id, e))
    }

    async fn search_records(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Result<Vec<Value>> {
        let limit = self.effective_limit(query.limit)?;
        validate_filters(
            &self.resolver,
            resource_type,
            query.object.as_deref(),
            &query.filters,
        )
        .await?;

        let mut effective = query.clone();
        effective.limit = Some(limit);

        tracing::debug!(
            "Searching {} (limit {}, offset {})",
            resource_type,
            limit,
            effective.offset
        );
        Ok(self.backend.search(resource_type, &effective).await?)
    }
}
