//! Dataset command implementation

use serde_json::Value;
use std::path::PathBuf;

use super::{load_manifest, load_settings};
use crate::api::{ApiClient, DatasetService, ensure_dataset};
use crate::cli::error::CliError;

/// Arguments for the dataset command
#[derive(Debug, Clone)]
pub struct DatasetArgs {
    pub manifest: Option<PathBuf>,
    pub config_dir: PathBuf,
    /// Only ensure the dataset exists, do not assign tables
    pub no_assign: bool,
}

/// Handle the dataset command
pub fn handle_dataset(args: &DatasetArgs) -> Result<(), CliError> {
    let settings = load_settings(&args.config_dir)?;
    let manifest = load_manifest(args.manifest.as_deref(), &settings)?.ok_or_else(|| {
        CliError::InvalidArgument(
            "No manifest found. Pass --manifest or set paths.datapackage_file.".to_string(),
        )
    })?;

    let client = ApiClient::from_settings(&settings)?;
    let service = DatasetService::new(&client);
    let dataset = ensure_dataset(
        &service,
        &manifest,
        &settings.upload.default_schema,
        !args.no_assign,
    )?;

    let field = |key: &str| {
        dataset
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string()
    };
    println!("Dataset ensured: {} (uuid: {})", field("name"), field("uuid"));
    Ok(())
}
