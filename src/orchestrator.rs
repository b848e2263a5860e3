//! Upload orchestration
//!
//! Resolves the load order once, then walks it table by table: locate the
//! sources, stream each file through the row pipeline and upload it in
//! batches. A failed table blocks its dependents but not its siblings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::api::{RowWriter, TableStore};
use crate::config::{Settings, default_null_tokens};
use crate::error::{UploadError, UploadResult};
use crate::locate::ResourceLocator;
use crate::manifest::Manifest;
use crate::models::{ResourceMap, SourceResource, TableRef, TableSchema};
use crate::pipeline::{RecordReader, RowError, RowMapper, ValueNormalizer};
use crate::report::{FileReport, RunReport, TableReport};
use crate::resolve::DependencyResolver;
use crate::upload::{
    BatchUploader, FileFailure, FileUpload, RetryPolicy, Sleeper, thread_sleeper,
};

/// Knobs for an upload run
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub batch_size: usize,
    pub dry_run: bool,
    pub default_schema: String,
    pub retry: RetryPolicy,
    pub null_tokens: Vec<String>,
    /// Directory relative resource paths resolve against
    pub data_root: PathBuf,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            dry_run: false,
            default_schema: "model_draft".to_string(),
            retry: RetryPolicy::default(),
            null_tokens: default_null_tokens(),
            data_root: PathBuf::from("data"),
        }
    }
}

impl UploadOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            batch_size: settings.upload.batch_size,
            dry_run: settings.upload.dry_run,
            default_schema: settings.upload.default_schema.clone(),
            retry: RetryPolicy::new(
                settings.upload.max_retries,
                settings.upload.retry_base_delay,
            ),
            null_tokens: settings.upload.null_tokens.clone(),
            data_root: settings.data_root(),
        }
    }
}

/// What to upload and where its files are mapped
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    /// Requested tables, any order
    pub tables: Vec<TableRef>,
    /// Table-to-resources map from the manifest
    pub manifest: ResourceMap,
    /// Per-table resources that win over the manifest
    pub overrides: ResourceMap,
}

impl UploadPlan {
    pub fn new(tables: Vec<TableRef>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    /// Every table the manifest maps to a local file, in manifest order
    pub fn from_manifest(manifest: &Manifest, default_schema: &str) -> Self {
        let resources = manifest.resource_map();
        Self {
            tables: resources
                .tables()
                .iter()
                .map(|name| TableRef::new(default_schema, name))
                .collect(),
            manifest: resources,
            overrides: ResourceMap::new(),
        }
    }

    pub fn with_manifest(mut self, manifest: ResourceMap) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_overrides(mut self, overrides: ResourceMap) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Sequences dependency resolution, resource location, the row pipeline and
/// the batch uploader
pub struct Orchestrator<S, W> {
    store: S,
    writer: W,
    options: UploadOptions,
    sleeper: Sleeper,
}

impl<S: TableStore, W: RowWriter> Orchestrator<S, W> {
    pub fn new(store: S, writer: W, options: UploadOptions) -> Self {
        Self {
            store,
            writer,
            options,
            sleeper: thread_sleeper(),
        }
    }

    /// Replace the pause used between retries
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Parents-first order of `tables` without uploading anything
    pub fn resolve_order(&self, tables: &[TableRef]) -> UploadResult<Vec<TableRef>> {
        Ok(DependencyResolver::new(&self.store).resolve(tables)?.order)
    }

    /// Run the plan.
    ///
    /// Only dependency resolution failures (a cycle, or a schema that cannot
    /// be fetched) end the run with an error. Everything else is recorded
    /// in the returned report.
    pub fn run(&self, plan: &UploadPlan) -> UploadResult<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(self.options.dry_run);

        let resolution = DependencyResolver::new(&self.store).resolve(&plan.tables)?;
        report.order = resolution.order.clone();

        let locator = ResourceLocator::new(&self.store);
        let mut failed: HashSet<TableRef> = HashSet::new();

        for table in &resolution.order {
            let blocker = resolution
                .graph
                .ancestors_of(table)
                .into_iter()
                .find(|ancestor| failed.contains(ancestor));
            if let Some(ancestor) = blocker {
                warn!("Skipping {}: ancestor {} failed", table, ancestor);
                failed.insert(table.clone());
                report.tables.push(TableReport::blocked(table.clone(), &ancestor));
                continue;
            }

            let mut table_report = TableReport::new(table.clone());
            let located = locator.locate(table, &plan.overrides, &plan.manifest);
            match (located, resolution.schemas.get(table)) {
                (Ok((resources, origin)), Some(schema)) => {
                    info!(
                        "[upload] table='{}' schema='{}' files={} source={:?}",
                        table.name,
                        table.schema,
                        resources.len(),
                        origin
                    );
                    table_report.source = Some(origin);
                    self.upload_table(table, schema, &resources, &mut table_report);
                }
                (Err(e), _) => {
                    error!("{}", e);
                    table_report.fail(e.to_string());
                }
                (Ok(_), None) => {
                    table_report.fail(format!("no schema resolved for {}", table));
                }
            }

            if table_report.is_completed() {
                info!(
                    "Done: {} uploaded {} rows total.",
                    table, table_report.rows_uploaded
                );
            } else {
                let dependents = resolution.graph.children_of(table);
                if !dependents.is_empty() {
                    let names: Vec<String> = dependents.iter().map(ToString::to_string).collect();
                    warn!("{} failed; blocking dependents: {}", table, names.join(", "));
                }
                failed.insert(table.clone());
            }
            report.tables.push(table_report);
        }

        report.duration = started.elapsed();
        Ok(report)
    }

    fn upload_table(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        resources: &[SourceResource],
        report: &mut TableReport,
    ) {
        for resource in resources {
            let path = resource.resolve_path(&self.options.data_root);
            if !report.is_completed() {
                report.files.push(FileReport::skipped(path));
                continue;
            }

            info!(
                "Processing {} from {} (delimiter={:?}, encoding='{}')",
                table,
                path.display(),
                resource.delimiter,
                resource.encoding
            );
            match self.upload_file(table, schema, resource, &path) {
                Ok(upload) => {
                    report.rows_uploaded += upload.rows;
                    report.files.push(FileReport::processed(path, upload.rows));
                }
                Err(FileFailure { accepted, error }) => {
                    error!("{}", error);
                    if accepted.rows > 0 {
                        warn!(
                            "{} rows from {} were written before the failure",
                            accepted.rows,
                            path.display()
                        );
                    }
                    report.rows_uploaded += accepted.rows;
                    report
                        .files
                        .push(FileReport::failed(path, accepted.rows, error.to_string()));
                    report.fail(error.to_string());
                }
            }
        }
    }

    fn upload_file(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        resource: &SourceResource,
        path: &Path,
    ) -> Result<FileUpload, FileFailure> {
        if !path.exists() {
            return Err(UploadError::FileNotFound {
                table: table.clone(),
                path: path.to_path_buf(),
            }
            .into());
        }

        let reader = RecordReader::open(path, resource).map_err(|source| UploadError::Read {
            table: table.clone(),
            path: path.to_path_buf(),
            source,
        })?;
        let mapper = RowMapper::new(
            schema,
            ValueNormalizer::new(&self.options.null_tokens),
        );

        let rows = reader.map(|record| {
            let record = record.map_err(|source| UploadError::Read {
                table: table.clone(),
                path: path.to_path_buf(),
                source,
            })?;
            mapper.map(&record).map_err(|e| match e {
                RowError::RequiredValueMissing {
                    column,
                    record,
                    row_head,
                } => UploadError::RequiredValueMissing {
                    table: table.clone(),
                    path: path.to_path_buf(),
                    record,
                    column,
                    row_head,
                },
            })
        });

        BatchUploader::new(&self.writer, self.options.batch_size, self.options.retry)
            .with_dry_run(self.options.dry_run)
            .with_sleeper(self.sleeper.clone())
            .upload(table, path, rows)
    }
}
