//! Batch uploader
//!
//! Groups validated rows into fixed-size batches and writes them with
//! retries on server and transport failures.

pub mod batch;
pub mod retry;

pub use batch::{BatchUploader, FileFailure, FileUpload};
pub use retry::{RetryOutcome, RetryPolicy, Sleeper, thread_sleeper};
