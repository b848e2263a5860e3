//! CLI-specific error types

use crate::api::{ApiError, DatasetError};
use crate::config::ConfigError;
use crate::error::UploadError;
use crate::manifest::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Manifest error: {0}")]
    ManifestError(#[from] ManifestError),

    #[error("API error: {0}")]
    ApiError(#[from] ApiError),

    #[error("Dataset error: {0}")]
    DatasetError(#[from] DatasetError),

    #[error("Upload error: {0}")]
    UploadError(#[from] UploadError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Upload finished with {0} unsuccessful table(s)")]
    RunFailed(usize),
}
