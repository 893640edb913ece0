use super::{BatchConfig, BatchItem, BatchOperationItem, BatchOptions, BatchResult};
use crate::common::validation_builders::quick;
use crate::error::{Result, UniversalError};
use crate::operations::{OperationKind, RecordOperations, SearchQuery};
use crate::resource::ResourceType;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

/// Runs batches of single-record operations
///
/// Only the pre-flight checks (operation kind, batch size, options) can fail
/// a whole call. After that every item produces exactly one outcome.
#[derive(Clone)]
pub struct BatchExecutor {
    operations: Arc<dyn RecordOperations>,
    config: BatchConfig,
}

impl BatchExecutor {
    /// Executor with limits from the global configuration
    pub fn new(operations: Arc<dyn RecordOperations>) -> Self {
        Self::with_config(operations, BatchConfig::default())
    }

    /// Executor with explicit limits
    pub fn with_config(operations: Arc<dyn RecordOperations>, config: BatchConfig) -> Self {
        Self { operations, config }
    }

    /// Limits in use
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Apply one operation to every item
    pub async fn execute_batch(
        &self,
        resource_type: ResourceType,
        operation: OperationKind,
        items: Vec<BatchItem>,
        options: &BatchOptions,
    ) -> Result<BatchResult> {
        if !operation.is_batchable() {
            return Err(UniversalError::UnsupportedBatchOperation(operation));
        }
        if items.len() > self.config.max_batch_size {
            return Err(UniversalError::BatchSizeExceeded {
                requested: items.len(),
                max: self.config.max_batch_size,
            });
        }

        let width = options.concurrency.unwrap_or(self.config.concurrency);
        if width == 0 {
            return Err(quick::out_of_range(
                "concurrency",
                0,
                1,
                self.config.max_batch_size,
            ));
        }
        let delay = options.delay.unwrap_or(self.config.delay);

        let span = tracing::info_span!(
            "batch",
            resource_type = %resource_type,
            operation = %operation,
            items = items.len()
        );

        async move {
            let mut outcomes = Vec::with_capacity(items.len());
            let indexed: Vec<(usize, BatchItem)> = items
                .into_iter()
                .map(|item| Self::apply_options(resource_type, item, options))
                .enumerate()
                .collect();

            for (chunk, batch) in indexed.chunks(width).enumerate() {
                if chunk > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                tracing::debug!(chunk, size = batch.len(), "Dispatching chunk");
                let results = join_all(
                    batch
                        .iter()
                        .map(|(index, item)| self.run_item(resource_type, operation, *index, item)),
                )
                .await;
                outcomes.extend(results);
            }

            let result = BatchResult::new(outcomes);
            tracing::info!(
                total = result.summary.total,
                successful = result.summary.successful,
                failed = result.summary.failed,
                "Batch {} on {} finished",
                operation,
                resource_type
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Run a single, non-batched search
    pub async fn search(&self, resource_type: ResourceType, query: &SearchQuery) -> Result<Vec<Value>> {
        self.operations.search_records(resource_type, query).await
    }

    fn apply_options(resource_type: ResourceType, mut item: BatchItem, options: &BatchOptions) -> BatchItem {
        if let (ResourceType::Records, Some(object), Some(data)) =
            (resource_type, options.object.as_ref(), item.data.as_mut())
        {
            if !data.contains_key("object") && !data.contains_key("object_api_slug") {
                data.insert("object".to_string(), Value::String(object.clone()));
            }
        }
        item
    }

    async fn run_item(
        &self,
        resource_type: ResourceType,
        operation: OperationKind,
        index: usize,
        item: &BatchItem,
    ) -> BatchOperationItem {
        let outcome = AssertUnwindSafe(self.dispatch(resource_type, operation, item))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => BatchOperationItem::succeeded(index, operation, item, result),
            Ok(Err(e)) => {
                tracing::debug!(index, "Batch item failed: {}", e);
                BatchOperationItem::failed(index, operation, item, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(index, "Batch item panicked: {}", message);
                BatchOperationItem::failed(
                    index,
                    operation,
                    item,
                    format!("Operation panicked: {message}"),
                )
            }
        }
    }

    async fn dispatch(
        &self,
        resource_type: ResourceType,
        operation: OperationKind,
        item: &BatchItem,
    ) -> Result<Value> {
        let context = format!("{operation} {resource_type}");
        let record_id = item.record_id.as_deref().filter(|id| !id.trim().is_empty());
        if operation.requires_record_id() && record_id.is_none() {
            return Err(quick::required_field(&context, "record_id"));
        }
        if operation.requires_data() && item.data.is_none() {
            return Err(quick::required_field(&context, "data"));
        }

        match (operation, record_id, item.data.as_ref()) {
            (OperationKind::Create, _, Some(data)) => {
                self.operations.create_record(resource_type, data).await
            }
            (OperationKind::Update, Some(id), Some(data)) => {
                self.operations.update_record(resource_type, id, data).await
            }
            (OperationKind::Delete, Some(id), _) => {
                self.operations.delete_record(resource_type, id).await
            }
            (OperationKind::Get, Some(id), _) => self.operations.get_record(resource_type, id).await,
            _ => Err(UniversalError::UnsupportedBatchOperation(operation)),
        }
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RecordData;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, Instant};

    /// Operations that succeed unless the payload says otherwise
    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Scripted {
        async fn run(&self, data: Option<&RecordData>, id: Option<&str>) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let behaviour = data
                .and_then(|d| d.get("behaviour"))
                .and_then(Value::as_str)
                .or(id);
            match behaviour {
                Some("fail") => Err(crate::error::RemoteError::new("Record not found").into()),
                Some("panic") => panic!("backend exploded"),
                _ => Ok(json!({"id": {"record_id": id.unwrap_or("new")}})),
            }
        }
    }

    #[async_trait]
    impl RecordOperations for Scripted {
        async fn create_record(&self, _r: ResourceType, data: &RecordData) -> Result<Value> {
            self.run(Some(data), None).await
        }

        async fn update_record(&self, _r: ResourceType, id: &str, data: &RecordData) -> Result<Value> {
            self.run(Some(data), Some(id)).await
        }

        async fn delete_record(&self, _r: ResourceType, id: &str) -> Result<Value> {
            self.run(None, Some(id)).await
        }

        async fn get_record(&self, _r: ResourceType, id: &str) -> Result<Value> {
            self.run(None, Some(id)).await
        }

        async fn search_records(&self, _r: ResourceType, query: &SearchQuery) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({"query": query.query})])
        }
    }

    fn executor(delay_ms: u64) -> (BatchExecutor, Arc<Scripted>) {
        let operations = Arc::new(Scripted::default());
        let executor = BatchExecutor::with_config(
            operations.clone(),
            BatchConfig {
                max_batch_size: 100,
                concurrency: 5,
                delay: Duration::from_millis(delay_ms),
            },
        );
        (executor, operations)
    }

    fn create(behaviour: &str) -> BatchItem {
        BatchItem::create(json!({"name": "x", "behaviour": behaviour}).as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_chunks_are_bounded_by_concurrency() {
        let (executor, operations) = executor(0);
        let items = (0..12).map(|_| create("ok")).collect();

        let result = executor
            .execute_batch(ResourceType::Companies, OperationKind::Create, items, &BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.summary.total, 12);
        assert!(result.all_succeeded());
        assert!(operations.max_in_flight.load(Ordering::SeqCst) <= 5);
        let indexes: Vec<_> = result.operations.iter().map(|op| op.index).collect();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_delay_between_chunks_only() {
        let (executor, _) = executor(50);

        let start = Instant::now();
        executor
            .execute_batch(
                ResourceType::Companies,
                OperationKind::Create,
                (0..5).map(|_| create("ok")).collect(),
                &BatchOptions::default(),
            )
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        let start = Instant::now();
        executor
            .execute_batch(
                ResourceType::Companies,
                OperationKind::Create,
                (0..11).map(|_| create("ok")).collect(),
                &BatchOptions::default(),
            )
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_failures_and_panics_are_isolated() {
        let (executor, _) = executor(0);
        let items = vec![create("ok"), create("fail"), create("panic"), create("ok")];

        let result = executor
            .execute_batch(ResourceType::People, OperationKind::Create, items, &BatchOptions::default())
            .await
            .unwrap();

        let flags: Vec<_> = result.operations.iter().map(|op| op.success).collect();
        assert_eq!(flags, vec![true, false, false, true]);
        assert_eq!(result.operations[1].error.as_deref(), Some("Record not found"));
        assert_eq!(
            result.operations[2].error.as_deref(),
            Some("Operation panicked: backend exploded")
        );
        assert_eq!(result.summary.successful, 2);
        assert_eq!(result.summary.failed, 2);
    }

    #[tokio::test]
    async fn test_missing_inputs_fail_per_item() {
        let (executor, operations) = executor(0);
        let items = vec![BatchItem::default(), BatchItem::id("r1"), BatchItem::id("  ")];

        let result = executor
            .execute_batch(ResourceType::Tasks, OperationKind::Update, items, &BatchOptions::default())
            .await
            .unwrap();

        assert!(result.operations.iter().all(|op| !op.success));
        assert!(result.operations[0].error.as_deref().unwrap().contains("record_id"));
        assert!(result.operations[1].error.as_deref().unwrap().contains("'data'"));
        assert_eq!(operations.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inputs_checked_per_operation() {
        let (executor, operations) = executor(0);

        let result = executor
            .execute_batch(ResourceType::Tasks, OperationKind::Create, vec![BatchItem::id("r1")], &BatchOptions::default())
            .await
            .unwrap();
        assert!(result.operations[0].error.as_deref().unwrap().contains("'data'"));

        for operation in [OperationKind::Delete, OperationKind::Get] {
            let result = executor
                .execute_batch(ResourceType::Tasks, operation, vec![create("ok")], &BatchOptions::default())
                .await
                .unwrap();
            assert!(
                result.operations[0].error.as_deref().unwrap().contains("record_id"),
                "{operation}"
            );
        }
        assert_eq!(operations.calls.load(Ordering::SeqCst), 0);

        let result = executor
            .execute_batch(ResourceType::Tasks, OperationKind::Get, vec![BatchItem::id("r1")], &BatchOptions::default())
            .await
            .unwrap();
        assert!(result.operations[0].success);
        assert_eq!(operations.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preflight_rejections() {
        let (executor, operations) = executor(0);

        let err = executor
            .execute_batch(
                ResourceType::Companies,
                OperationKind::Create,
                (0..101).map(|_| create("ok")).collect(),
                &BatchOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Batch size (101) exceeds maximum allowed (100)");

        let err = executor
            .execute_batch(ResourceType::Companies, OperationKind::Search, vec![], &BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UniversalError::UnsupportedBatchOperation(OperationKind::Search)));

        let options = BatchOptions {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(executor
            .execute_batch(ResourceType::Companies, OperationKind::Create, vec![create("ok")], &options)
            .await
            .is_err());

        assert_eq!(operations.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (executor, _) = executor(0);
        let result = executor
            .execute_batch(ResourceType::Notes, OperationKind::Delete, vec![], &BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(result.summary.total, 0);
        assert!(result.operations.is_empty());
    }

    #[tokio::test]
    async fn test_object_option_fills_record_payloads() {
        let item = BatchExecutor::apply_options(
            ResourceType::Records,
            create("ok"),
            &BatchOptions {
                object: Some("vendors".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(item.data.unwrap()["object"], json!("vendors"));

        let item = BatchExecutor::apply_options(
            ResourceType::Companies,
            create("ok"),
            &BatchOptions {
                object: Some("vendors".to_string()),
                ..Default::default()
            },
        );
        assert!(item.data.unwrap().get("object").is_none());
    }

    #[tokio::test]
    async fn test_search_is_a_single_call() {
        let (executor, operations) = executor(0);
        let results = executor
            .search(ResourceType::Companies, &SearchQuery::text("acme"))
            .await
            .unwrap();
        assert_eq!(results, vec![json!({"query": "acme"})]);
        assert_eq!(operations.calls.load(Ordering::SeqCst), 1);
    }
}
