//! Error types for upload runs

use serde_json::Value;
use std::path::PathBuf;

use crate::api::ApiError;
use crate::models::TableRef;
use crate::pipeline::ReadError;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Error type for upload runs.
///
/// `CyclicDependency` is fatal to the whole run. The other kinds abort the
/// file being processed, which fails its table and blocks the table's
/// dependents.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("FK cycle or missing external parents among: {}", table_list(.tables))]
    CyclicDependency { tables: Vec<TableRef> },

    #[error("No local tabular paths found for {table}")]
    NoSourceFound { table: TableRef },

    #[error("CSV not found for {table}: {}", .path.display())]
    FileNotFound { table: TableRef, path: PathBuf },

    #[error(
        "Row conversion error in {} (record {record}): column {column} is NOT NULL but value is missing/NULL; row head: {row_head}",
        .path.display()
    )]
    RequiredValueMissing {
        table: TableRef,
        path: PathBuf,
        record: usize,
        column: String,
        row_head: String,
    },

    #[error("POST to {table} rejected for {}: HTTP {status} {payload}", .path.display())]
    UploadRejected {
        table: TableRef,
        path: PathBuf,
        status: u16,
        payload: Value,
    },

    #[error("POST to {table} failed for {} after {attempts} attempt(s): {last_error}", .path.display())]
    UploadExhausted {
        table: TableRef,
        path: PathBuf,
        attempts: u32,
        last_error: String,
    },

    #[error("Failed to read {} for {table}: {source}", .path.display())]
    Read {
        table: TableRef,
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    #[error("API call for {table} failed: {source}")]
    Api {
        table: TableRef,
        #[source]
        source: ApiError,
    },
}

impl UploadError {
    /// Table the error belongs to, `None` for run-level errors
    pub fn table(&self) -> Option<&TableRef> {
        match self {
            UploadError::CyclicDependency { .. } => None,
            UploadError::NoSourceFound { table }
            | UploadError::FileNotFound { table, .. }
            | UploadError::RequiredValueMissing { table, .. }
            | UploadError::UploadRejected { table, .. }
            | UploadError::UploadExhausted { table, .. }
            | UploadError::Read { table, .. }
            | UploadError::Api { table, .. } => Some(table),
        }
    }

    /// Whether the error ends the whole run rather than one table
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, UploadError::CyclicDependency { .. })
    }
}

fn table_list(tables: &[TableRef]) -> String {
    let names: Vec<String> = tables.iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cycle_message_names_tables() {
        let err = UploadError::CyclicDependency {
            tables: vec![
                TableRef::new("model_draft", "a"),
                TableRef::new("model_draft", "b"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "FK cycle or missing external parents among: [model_draft.a, model_draft.b]"
        );
        assert!(err.is_fatal_to_run());
        assert!(err.table().is_none());
    }

    #[test]
    fn test_file_errors_carry_context() {
        let table = TableRef::new("model_draft", "persons");
        let err = UploadError::UploadRejected {
            table: table.clone(),
            path: PathBuf::from("data/persons.csv"),
            status: 400,
            payload: json!({"reason": "bad column"}),
        };
        let message = err.to_string();
        assert!(message.contains("data/persons.csv"));
        assert!(message.contains("HTTP 400"));
        assert!(message.contains("bad column"));
        assert_eq!(err.table(), Some(&table));
        assert!(!err.is_fatal_to_run());
    }
}
