//! Remote table store API
//!
//! The upload core talks to the store only through the [`TableStore`] and
//! [`RowWriter`] traits. [`ApiClient`] implements both over HTTP; tests and
//! alternative backends provide their own implementations.

#[cfg(feature = "api-backend")]
pub mod client;
pub mod datasets;
pub mod table_info;

#[cfg(feature = "api-backend")]
pub use client::ApiClient;
#[cfg(feature = "api-backend")]
pub use datasets::DatasetService;
pub use datasets::{DatasetApi, DatasetError, ensure_dataset};
pub use table_info::parse_table_info;

use serde_json::Value;

use crate::models::{Row, TableRef, TableSchema};

/// Statuses the row endpoint returns on success
pub const SUCCESS_STATUSES: [u16; 3] = [200, 201, 202];

/// Error type for store API calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Request never produced an HTTP response (connect, timeout, TLS, ...)
    #[error("Transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// Store answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body could not be interpreted
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Client could not be configured
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status, if the store answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Response of a write call, whatever its status
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body, or `{"raw": <text>}` when the body is not JSON
    pub payload: Value,
}

impl WriteResponse {
    pub fn new(status: u16, payload: Value) -> Self {
        Self { status, payload }
    }

    /// 200, 201 or 202
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUSES.contains(&self.status)
    }

    /// Server-class failure, worth retrying
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Read side of the store: live schemas and metadata documents
pub trait TableStore {
    /// Column definitions and constraints of a table
    fn table_schema(&self, table: &TableRef) -> Result<TableSchema, ApiError>;

    /// The table's metadata document (manifest-shaped JSON)
    fn table_metadata(&self, table: &TableRef) -> Result<Value, ApiError>;
}

/// Write side of the store: row insertion.
///
/// Implementations return `Ok` for every HTTP response, including error
/// statuses, and `Err` only when no response was obtained. Retry policy is
/// applied by the caller.
pub trait RowWriter {
    fn post_rows(&self, table: &TableRef, rows: &[Row]) -> Result<WriteResponse, ApiError>;
}

impl<T: TableStore + ?Sized> TableStore for &T {
    fn table_schema(&self, table: &TableRef) -> Result<TableSchema, ApiError> {
        (**self).table_schema(table)
    }

    fn table_metadata(&self, table: &TableRef) -> Result<Value, ApiError> {
        (**self).table_metadata(table)
    }
}

impl<T: RowWriter + ?Sized> RowWriter for &T {
    fn post_rows(&self, table: &TableRef, rows: &[Row]) -> Result<WriteResponse, ApiError> {
        (**self).post_rows(table, rows)
    }
}
