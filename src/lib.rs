//! OEP Upload - bulk loader for tabular data into a remote table store
//!
//! Provides:
//! - Foreign-key aware load ordering across tables
//! - Source resolution from a package manifest or table metadata
//! - Row normalization and NOT NULL validation against live schemas
//! - Batched writes with retry and exponential backoff
//! - Dataset registration and layered configuration

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod locate;
pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod upload;

// Re-export commonly used types
#[cfg(feature = "api-backend")]
pub use api::{ApiClient, DatasetService};
pub use api::{
    ApiError, DatasetApi, DatasetError, RowWriter, TableStore, WriteResponse, ensure_dataset,
};
pub use config::{ConfigError, Environment, Settings};
pub use error::{UploadError, UploadResult};
pub use locate::{ResourceLocator, ResourceOrigin};
pub use manifest::{Manifest, ManifestError};
pub use models::{ColumnSpec, ForeignKeyConstraint, ResourceMap, Row, SourceResource, TableRef, TableSchema};
pub use orchestrator::{Orchestrator, UploadOptions, UploadPlan};
pub use report::{FileReport, FileStatus, RunReport, TableReport, TableStatus};
pub use resolve::{DependencyGraph, DependencyResolver};
pub use upload::{BatchUploader, RetryPolicy};
