//! Upload command implementation

use std::path::PathBuf;
use tracing::info;

use super::{load_manifest, load_settings, parse_tables};
use crate::api::ApiClient;
use crate::cli::error::CliError;
use crate::models::ResourceMap;
use crate::orchestrator::{Orchestrator, UploadOptions, UploadPlan};
use crate::report::{FileStatus, RunReport, TableStatus};

/// Arguments for the upload command
#[derive(Debug, Clone)]
pub struct UploadArgs {
    /// Tables to upload; empty means every table in the manifest
    pub tables: Vec<String>,
    pub manifest: Option<PathBuf>,
    pub config_dir: PathBuf,
    pub dry_run: bool,
    pub batch_size: Option<usize>,
    pub schema: Option<String>,
    /// Print the run report as JSON
    pub json: bool,
}

/// Handle the upload command
pub fn handle_upload(args: &UploadArgs) -> Result<(), CliError> {
    let mut settings = load_settings(&args.config_dir)?;
    if args.dry_run {
        settings.upload.dry_run = true;
    }
    if let Some(batch_size) = args.batch_size {
        settings.upload.batch_size = batch_size;
    }
    if let Some(schema) = &args.schema {
        settings.upload.default_schema = schema.clone();
    }
    settings.validate()?;

    let default_schema = settings.upload.default_schema.clone();
    let manifest = load_manifest(args.manifest.as_deref(), &settings)?;
    let resources = manifest
        .as_ref()
        .map(|m| m.resource_map())
        .unwrap_or_else(ResourceMap::new);

    let plan = if args.tables.is_empty() {
        match &manifest {
            Some(manifest) => UploadPlan::from_manifest(manifest, &default_schema),
            None => UploadPlan::default(),
        }
    } else {
        UploadPlan::new(parse_tables(&args.tables, &default_schema)).with_manifest(resources)
    };

    if plan.tables.is_empty() {
        return Err(CliError::InvalidArgument(
            "No tables to upload. Check your manifest or pass table names.".to_string(),
        ));
    }
    info!("Uploading {} table(s)", plan.tables.len());

    let client = ApiClient::from_settings(&settings)?;
    let orchestrator = Orchestrator::new(&client, &client, UploadOptions::from_settings(&settings));
    let report = orchestrator.run(&plan)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&report);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::RunFailed(report.unsuccessful().count()))
    }
}

fn print_summary(report: &RunReport) {
    let order: Vec<&str> = report.order.iter().map(|t| t.name.as_str()).collect();
    println!("Upload order: {}", order.join(" -> "));
    if report.dry_run {
        println!("(dry run, nothing was written)");
    }

    for table in &report.tables {
        let status = match table.status {
            TableStatus::Completed => "OK",
            TableStatus::Failed => "FAILED",
            TableStatus::Blocked => "BLOCKED",
        };
        println!(
            "  [{}] {}: {} row(s)",
            status, table.table, table.rows_uploaded
        );
        for file in &table.files {
            let marker = match file.status {
                FileStatus::Processed => "processed",
                FileStatus::Skipped => "skipped",
                FileStatus::Failed => "failed",
            };
            println!("      {} {} ({} rows)", marker, file.path.display(), file.rows);
        }
        if let Some(error) = &table.error {
            println!("      error: {}", error);
        }
    }

    println!(
        "Total: {} row(s) in {} (run {})",
        report.total_rows(),
        report.duration_string(),
        report.run_id
    );
}
