//! Fixed-size batching of rows into write calls

use std::path::Path;
use tracing::info;

use super::retry::{RetryOutcome, RetryPolicy, Sleeper, thread_sleeper};
use crate::api::RowWriter;
use crate::error::{UploadError, UploadResult};
use crate::models::{Row, TableRef};

/// Rows accepted from one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUpload {
    /// Rows written (or counted, in a dry run)
    pub rows: usize,
    /// Size of every submitted batch, in order
    pub batches: Vec<usize>,
}

/// A file that stopped early, with the rows accepted before it stopped
#[derive(Debug)]
pub struct FileFailure {
    pub accepted: FileUpload,
    pub error: UploadError,
}

impl From<UploadError> for FileFailure {
    fn from(error: UploadError) -> Self {
        Self {
            accepted: FileUpload::default(),
            error,
        }
    }
}

/// Groups rows into batches of at most `batch_size` and writes each batch
/// through a [`RowWriter`] with retries
pub struct BatchUploader<W> {
    writer: W,
    batch_size: usize,
    dry_run: bool,
    retry: RetryPolicy,
    sleeper: Sleeper,
}

impl<W: RowWriter> BatchUploader<W> {
    /// A batch size of zero is treated as one
    pub fn new(writer: W, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
            dry_run: false,
            retry,
            sleeper: thread_sleeper(),
        }
    }

    /// Skip network calls and only count rows
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace the pause used between retries
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Upload all rows of one source file.
    ///
    /// The first row error or failed batch stops the file; batches sent
    /// before that stay written and are reported in [`FileFailure::accepted`].
    pub fn upload<I>(
        &self,
        table: &TableRef,
        path: &Path,
        rows: I,
    ) -> Result<FileUpload, FileFailure>
    where
        I: IntoIterator<Item = UploadResult<Row>>,
    {
        let mut accepted = FileUpload::default();
        match self.upload_into(table, path, rows, &mut accepted) {
            Ok(()) => Ok(accepted),
            Err(error) => Err(FileFailure { accepted, error }),
        }
    }

    fn upload_into<I>(
        &self,
        table: &TableRef,
        path: &Path,
        rows: I,
        accepted: &mut FileUpload,
    ) -> UploadResult<()>
    where
        I: IntoIterator<Item = UploadResult<Row>>,
    {
        let mut batch: Vec<Row> = Vec::with_capacity(self.batch_size);

        for row in rows {
            batch.push(row?);
            if batch.len() >= self.batch_size {
                self.submit(table, path, &batch)?;
                accepted.rows += batch.len();
                accepted.batches.push(batch.len());
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.submit(table, path, &batch)?;
            accepted.rows += batch.len();
            accepted.batches.push(batch.len());
        }
        Ok(())
    }

    fn submit(&self, table: &TableRef, path: &Path, batch: &[Row]) -> UploadResult<()> {
        if self.dry_run {
            info!("DRY_RUN: would POST batch of {} rows to {}", batch.len(), table);
            return Ok(());
        }

        match self
            .retry
            .run(&self.sleeper, || self.writer.post_rows(table, batch))
        {
            RetryOutcome::Answered { response, .. } if response.is_success() => {
                info!("Uploaded {} rows -> status {}", batch.len(), response.status);
                Ok(())
            }
            RetryOutcome::Answered { response, .. } => Err(UploadError::UploadRejected {
                table: table.clone(),
                path: path.to_path_buf(),
                status: response.status,
                payload: response.payload,
            }),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(UploadError::UploadExhausted {
                table: table.clone(),
                path: path.to_path_buf(),
                attempts,
                last_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, WriteResponse};
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedWriter {
        statuses: RefCell<VecDeque<u16>>,
        posted: RefCell<Vec<usize>>,
    }

    impl ScriptedWriter {
        fn with_statuses(statuses: &[u16]) -> Self {
            Self {
                statuses: RefCell::new(statuses.iter().copied().collect()),
                posted: RefCell::default(),
            }
        }
    }

    impl RowWriter for ScriptedWriter {
        fn post_rows(&self, _table: &TableRef, rows: &[Row]) -> Result<WriteResponse, ApiError> {
            self.posted.borrow_mut().push(rows.len());
            let status = self.statuses.borrow_mut().pop_front().unwrap_or(201);
            Ok(WriteResponse::new(status, json!({"status": status})))
        }
    }

    fn rows(n: usize) -> Vec<UploadResult<Row>> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("value".into(), Value::from(i));
                Ok(row)
            })
            .collect()
    }

    fn no_sleep() -> Sleeper {
        Arc::new(|_| {})
    }

    fn table() -> TableRef {
        TableRef::new("model_draft", "readings")
    }

    #[test]
    fn test_splits_into_fixed_batches() {
        let writer = ScriptedWriter::default();
        let uploader = BatchUploader::new(&writer, 500, RetryPolicy::default());
        let result = uploader
            .upload(&table(), Path::new("readings.csv"), rows(1250))
            .unwrap();

        assert_eq!(result.rows, 1250);
        assert_eq!(result.batches, vec![500, 500, 250]);
        assert_eq!(*writer.posted.borrow(), vec![500, 500, 250]);
    }

    #[test]
    fn test_dry_run_counts_without_writing() {
        let writer = ScriptedWriter::default();
        let uploader = BatchUploader::new(&writer, 2, RetryPolicy::default()).with_dry_run(true);
        let result = uploader
            .upload(&table(), Path::new("readings.csv"), rows(5))
            .unwrap();

        assert_eq!(result.rows, 5);
        assert_eq!(result.batches, vec![2, 2, 1]);
        assert!(writer.posted.borrow().is_empty());
    }

    #[test]
    fn test_rejected_batch_stops_file() {
        let writer = ScriptedWriter::with_statuses(&[201, 400]);
        let uploader = BatchUploader::new(&writer, 2, RetryPolicy::default()).with_sleeper(no_sleep());
        let failure = uploader
            .upload(&table(), Path::new("readings.csv"), rows(6))
            .unwrap_err();

        assert_eq!(failure.accepted.rows, 2);
        assert_eq!(failure.accepted.batches, vec![2]);
        match failure.error {
            UploadError::UploadRejected { status, payload, .. } => {
                assert_eq!(status, 400);
                assert_eq!(payload, json!({"status": 400}));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(*writer.posted.borrow(), vec![2, 2]);
    }

    #[test]
    fn test_exhausted_retries() {
        let writer = ScriptedWriter::with_statuses(&[500, 500, 500]);
        let uploader =
            BatchUploader::new(&writer, 10, RetryPolicy::new(3, 1.5)).with_sleeper(no_sleep());
        let failure = uploader
            .upload(&table(), Path::new("readings.csv"), rows(3))
            .unwrap_err();

        assert!(matches!(
            failure.error,
            UploadError::UploadExhausted { attempts: 3, .. }
        ));
        assert_eq!(failure.accepted, FileUpload::default());
        assert_eq!(writer.posted.borrow().len(), 3);
    }

    #[test]
    fn test_row_error_stops_before_partial_batch() {
        let writer = ScriptedWriter::default();
        let uploader = BatchUploader::new(&writer, 2, RetryPolicy::default());
        let mut input = rows(3);
        input.push(Err(UploadError::NoSourceFound { table: table() }));
        input.extend(rows(2));

        let failure = uploader
            .upload(&table(), Path::new("readings.csv"), input)
            .unwrap_err();
        // the first full batch was written, the pending row was not
        assert_eq!(*writer.posted.borrow(), vec![2]);
        assert_eq!(failure.accepted.rows, 2);
        assert!(matches!(failure.error, UploadError::NoSourceFound { .. }));
    }
}
