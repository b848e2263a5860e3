//! Run and per-table reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::locate::ResourceOrigin;
use crate::models::TableRef;

/// Outcome of one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processed,
    /// Not attempted because an earlier file of the same table failed
    Skipped,
    Failed,
}

/// Outcome of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Completed,
    Failed,
    /// Not attempted because an ancestor failed
    Blocked,
}

/// Per-file entry of a [`TableReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Resolved path
    pub path: PathBuf,
    pub status: FileStatus,
    /// Rows accepted from this file
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn processed(path: PathBuf, rows: usize) -> Self {
        Self {
            path,
            status: FileStatus::Processed,
            rows,
            error: None,
        }
    }

    pub fn failed(path: PathBuf, rows: usize, error: String) -> Self {
        Self {
            path,
            status: FileStatus::Failed,
            rows,
            error: Some(error),
        }
    }

    pub fn skipped(path: PathBuf) -> Self {
        Self {
            path,
            status: FileStatus::Skipped,
            rows: 0,
            error: None,
        }
    }
}

/// Result of loading one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table: TableRef,
    pub status: TableStatus,
    /// Total rows accepted across all files
    pub rows_uploaded: usize,
    /// Where the table's files were found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ResourceOrigin>,
    pub files: Vec<FileReport>,
    /// Terminal error when the load was aborted or blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableReport {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            status: TableStatus::Completed,
            rows_uploaded: 0,
            source: None,
            files: Vec::new(),
            error: None,
        }
    }

    /// Report for a table skipped because `ancestor` failed
    pub fn blocked(table: TableRef, ancestor: &TableRef) -> Self {
        Self {
            status: TableStatus::Blocked,
            error: Some(format!("blocked by failed table {}", ancestor)),
            ..Self::new(table)
        }
    }

    /// Mark the table failed with its terminal error
    pub fn fail(&mut self, error: String) {
        self.status = TableStatus::Failed;
        self.error = Some(error);
    }

    pub fn is_completed(&self) -> bool {
        self.status == TableStatus::Completed
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Parents-first load order
    pub order: Vec<TableRef>,
    /// One report per table, in load order
    pub tables: Vec<TableReport>,
    /// Wall-clock time of the run
    #[serde(skip)]
    pub duration: Duration,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            dry_run,
            order: Vec::new(),
            tables: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// True only when every table completed
    pub fn is_success(&self) -> bool {
        self.tables.iter().all(TableReport::is_completed)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows_uploaded).sum()
    }

    pub fn table(&self, table: &TableRef) -> Option<&TableReport> {
        self.tables.iter().find(|t| &t.table == table)
    }

    /// Tables that did not complete
    pub fn unsuccessful(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| !t.is_completed())
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}
