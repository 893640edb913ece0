//! # Attio Universal
//!
//! Universal record operations for Attio-style CRM APIs.
//!
//! ## Features
//!
//! - **Metadata**: Attribute schemas per resource type, cached with a TTL
//! - **Error Guidance**: Raw create and update failures turned into
//!   categorized errors with concrete next steps
//! - **Batches**: Chunked, paced execution with one outcome per item
//! - **Search Filters**: Select and status values checked before the call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use attio_universal::operations::{MockRecordBackend, RecordOperations};
//! use attio_universal::{ResourceType, UniversalRecordService};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> attio_universal::Result<()> {
//! let service = UniversalRecordService::new(Arc::new(MockRecordBackend::new()))?;
//!
//! let data = json!({"name": "Acme"}).as_object().cloned().unwrap_or_default();
//! match service.create_record(ResourceType::Companies, &data).await {
//!     Ok(record) => println!("created {record}"),
//!     Err(e) => eprintln!("{} ({:?})", e, e.kind_name()),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Batch execution of record operations
pub mod batch;

/// Shared helpers for environment loading and input validation
pub mod common;

/// Runtime configuration
pub mod config;

/// Classification of raw create and update failures
pub mod enhance;

/// Error types
pub mod error;

/// Attribute metadata and its cache
pub mod metadata;

/// Record operations, search filters and backends
pub mod operations;

/// Resource types and record payloads
pub mod resource;

#[cfg(test)]
mod test_utils;

pub use batch::{BatchExecutor, BatchItem, BatchOptions, BatchResult, BatchSummary};
pub use config::Config;
pub use enhance::{EnhancedError, ErrorEnhancementCoordinator, ErrorKind};
pub use error::{RemoteError, Result, UniversalError};
pub use metadata::{MetadataCache, MetadataFetchResult, MetadataOptions, MetadataResolver};
pub use operations::{OperationKind, RecordOperations, SearchQuery, UniversalRecordService};
pub use resource::{RecordData, ResourceType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
