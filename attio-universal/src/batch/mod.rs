//! Batch execution of record operations
//!
//! A batch applies one operation kind to many records of one resource type.
//! Items run in chunks: the items of a chunk run concurrently, chunks run
//! one after another with a pause in between. Every item gets its own
//! success or failure entry, and a failing item never stops the others.
//!
//! ```rust,no_run
//! use attio_universal::batch::{BatchExecutor, BatchItem, BatchOptions};
//! use attio_universal::operations::{OperationKind, RecordOperations};
//! use attio_universal::ResourceType;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(operations: Arc<dyn RecordOperations>) -> attio_universal::Result<()> {
//! let executor = BatchExecutor::new(operations);
//! let items = vec![
//!     BatchItem::create(json!({"name": "Acme"}).as_object().cloned().unwrap_or_default()),
//!     BatchItem::create(json!({"name": "Globex"}).as_object().cloned().unwrap_or_default()),
//! ];
//!
//! let result = executor
//!     .execute_batch(ResourceType::Companies, OperationKind::Create, items, &BatchOptions::default())
//!     .await?;
//! println!("{} of {} succeeded", result.summary.successful, result.summary.total);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::operations::OperationKind;
use crate::resource::RecordData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Duration;

/// Chunked, paced batch executor
pub mod executor;

pub use executor::BatchExecutor;

/// Longest payload snippet kept for display
const SNIPPET_MAX_CHARS: usize = 80;

/// Input for one operation of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Target record, for update, delete and get
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Payload, for create and update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RecordData>,
}

impl BatchItem {
    /// Item for a create
    pub fn create(data: RecordData) -> Self {
        Self {
            record_id: None,
            data: Some(data),
        }
    }

    /// Item for an update
    pub fn update(record_id: impl Into<String>, data: RecordData) -> Self {
        Self {
            record_id: Some(record_id.into()),
            data: Some(data),
        }
    }

    /// Item for a delete or get
    pub fn id(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            data: None,
        }
    }
}

/// Outcome of one operation of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperationItem {
    /// Position of the item in the request
    pub index: usize,
    /// Operation that was attempted
    pub operation: OperationKind,
    /// Whether the operation succeeded
    pub success: bool,
    /// Returned payload, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error text, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Record the operation targeted or produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Short description of the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_snippet: Option<String>,
}

impl BatchOperationItem {
    /// A successful outcome
    pub fn succeeded(index: usize, operation: OperationKind, item: &BatchItem, result: Value) -> Self {
        let record_id = item
            .record_id
            .clone()
            .or_else(|| crate::resource::record_id(&result));
        Self {
            index,
            operation,
            success: true,
            result: Some(result),
            error: None,
            record_id,
            data_snippet: item.data.as_ref().and_then(data_snippet),
        }
    }

    /// A failed outcome
    pub fn failed(index: usize, operation: OperationKind, item: &BatchItem, error: String) -> Self {
        Self {
            index,
            operation,
            success: false,
            result: None,
            error: Some(error),
            record_id: item.record_id.clone(),
            data_snippet: item.data.as_ref().and_then(data_snippet),
        }
    }
}

/// Short display text for a payload: its name-like field, or truncated JSON
pub fn data_snippet(data: &RecordData) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let named = ["name", "title", "content"]
        .iter()
        .find_map(|key| data.get(*key))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("full_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        });

    let text = named.unwrap_or_else(|| Value::Object(data.clone()).to_string());
    if text.chars().count() > SNIPPET_MAX_CHARS {
        let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(text)
    }
}

/// Aggregate counts of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items attempted
    pub total: usize,
    /// Items that succeeded
    pub successful: usize,
    /// Items that failed
    pub failed: usize,
}

impl BatchSummary {
    /// Count outcomes
    pub fn from_operations(operations: &[BatchOperationItem]) -> Self {
        let successful = operations.iter().filter(|op| op.success).count();
        Self {
            total: operations.len(),
            successful,
            failed: operations.len() - successful,
        }
    }
}

/// Per-item outcomes and their summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Outcomes in request order
    pub operations: Vec<BatchOperationItem>,
    /// Counts derived from `operations`
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Build a result, deriving the summary
    pub fn new(operations: Vec<BatchOperationItem>) -> Self {
        let summary = BatchSummary::from_operations(&operations);
        Self {
            operations,
            summary,
        }
    }

    /// Whether every item succeeded
    pub fn all_succeeded(&self) -> bool {
        self.summary.failed == 0
    }

    /// The failed outcomes
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationItem> {
        self.operations.iter().filter(|op| !op.success)
    }
}

/// Limits applied by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Largest accepted batch
    pub max_batch_size: usize,
    /// Items dispatched concurrently per chunk
    pub concurrency: usize,
    /// Pause between chunks
    pub delay: Duration,
}

impl BatchConfig {
    /// Limits taken from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            concurrency: config.batch_concurrency.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_config(Config::global())
    }
}

/// Per-call adjustments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    /// Object qualifier added to generic record payloads that lack one
    pub object: Option<String>,
    /// Chunk width for this call
    pub concurrency: Option<usize>,
    /// Pause between chunks for this call
    pub delay: Option<Duration>,
}
