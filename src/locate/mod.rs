//! Resource location
//!
//! Decides which local files feed a table: an explicit override first, then
//! the manifest, then the tabular paths the table's own metadata declares.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::TableStore;
use crate::error::{UploadError, UploadResult};
use crate::models::{ResourceMap, SourceResource, TableRef, looks_tabular_path};

/// Where a table's resources came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceOrigin {
    Override,
    Manifest,
    Metadata,
}

/// Finds source resources for tables
pub struct ResourceLocator<S> {
    store: S,
}

impl<S: TableStore> ResourceLocator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve the source resources of `table`.
    ///
    /// Fails with [`UploadError::NoSourceFound`] when no source yields a
    /// local tabular file.
    pub fn locate(
        &self,
        table: &TableRef,
        overrides: &ResourceMap,
        manifest: &ResourceMap,
    ) -> UploadResult<(Vec<SourceResource>, ResourceOrigin)> {
        let key = table.key();

        let resources = overrides.get(key);
        if !resources.is_empty() {
            return Ok((resources.to_vec(), ResourceOrigin::Override));
        }

        let resources = manifest.get(key);
        if !resources.is_empty() {
            return Ok((resources.to_vec(), ResourceOrigin::Manifest));
        }

        debug!("No mapped resources for {}, reading table metadata", table);
        let metadata = self
            .store
            .table_metadata(table)
            .map_err(|source| UploadError::Api {
                table: table.clone(),
                source,
            })?;
        let resources = tabular_resources_in_metadata(&metadata);
        if resources.is_empty() {
            return Err(UploadError::NoSourceFound {
                table: table.clone(),
            });
        }
        if resources.len() > 1 {
            info!(
                "Multiple tabular paths found for {}: {:?}",
                table,
                resources.iter().map(|r| r.path.as_str()).collect::<Vec<_>>()
            );
        }
        Ok((resources, ResourceOrigin::Metadata))
    }
}

/// Local tabular resources declared in a metadata document.
///
/// The explicit `resources` list wins. When it yields nothing, every nested
/// object is scanned for a `path` key with a tabular extension. Duplicate
/// paths are dropped, keeping the first.
pub fn tabular_resources_in_metadata(metadata: &Value) -> Vec<SourceResource> {
    let mut found: Vec<SourceResource> = metadata
        .get("resources")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(SourceResource::from_descriptor).collect())
        .unwrap_or_default();

    if found.is_empty() {
        collect_tabular_paths(metadata, &mut found);
    }

    let mut seen = std::collections::HashSet::new();
    found.retain(|r| seen.insert(r.path.clone()));
    found
}

fn collect_tabular_paths(value: &Value, found: &mut Vec<SourceResource>) {
    match value {
        Value::Object(object) => {
            if let Some(path) = object.get("path").and_then(Value::as_str).map(str::trim)
                && looks_tabular_path(path)
            {
                found.push(SourceResource::new(path));
            }
            for nested in object.values() {
                collect_tabular_paths(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_tabular_paths(item, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::TableSchema;
    use serde_json::json;
    use std::cell::Cell;

    struct MetadataStore {
        metadata: Value,
        calls: Cell<usize>,
    }

    impl TableStore for MetadataStore {
        fn table_schema(&self, table: &TableRef) -> Result<TableSchema, ApiError> {
            Ok(TableSchema::new(table.clone(), Vec::new()))
        }

        fn table_metadata(&self, _table: &TableRef) -> Result<Value, ApiError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.metadata.clone())
        }
    }

    fn store(metadata: Value) -> MetadataStore {
        MetadataStore {
            metadata,
            calls: Cell::new(0),
        }
    }

    fn table() -> TableRef {
        TableRef::new("model_draft", "scalars")
    }

    #[test]
    fn test_override_wins_over_manifest() {
        let store = store(json!({}));
        let overrides: ResourceMap = vec![("Scalars", SourceResource::new("override.csv"))]
            .into_iter()
            .collect();
        let manifest: ResourceMap = vec![("scalars", SourceResource::new("manifest.csv"))]
            .into_iter()
            .collect();

        let (resources, origin) = ResourceLocator::new(&store)
            .locate(&table(), &overrides, &manifest)
            .unwrap();
        assert_eq!(origin, ResourceOrigin::Override);
        assert_eq!(resources[0].path, "override.csv");
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_manifest_before_metadata() {
        let store = store(json!({}));
        let manifest: ResourceMap = vec![("scalars", SourceResource::new("manifest.tsv"))]
            .into_iter()
            .collect();

        let (resources, origin) = ResourceLocator::new(&store)
            .locate(&table(), &ResourceMap::new(), &manifest)
            .unwrap();
        assert_eq!(origin, ResourceOrigin::Manifest);
        assert_eq!(resources[0].delimiter, '\t');
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_metadata_resources_list() {
        let store = store(json!({
            "resources": [
                {"path": "data/scalars.csv", "dialect": {"delimiter": ";"}},
                {"path": "https://example.org/remote.csv"},
                {"path": "data/scalars.csv"},
                {"path": "docs/readme.md"}
            ]
        }));
        let (resources, origin) = ResourceLocator::new(&store)
            .locate(&table(), &ResourceMap::new(), &ResourceMap::new())
            .unwrap();
        assert_eq!(origin, ResourceOrigin::Metadata);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].delimiter, ';');
    }

    #[test]
    fn test_metadata_deep_scan_fallback() {
        let metadata = json!({
            "resources": [{"path": "notes.json"}],
            "context": {
                "sources": [
                    {"title": "A", "path": "raw/a.TSV"},
                    {"nested": {"path": "raw/b.csv"}},
                    {"path": "raw/a.TSV"}
                ]
            }
        });
        let resources = tabular_resources_in_metadata(&metadata);
        let paths: Vec<&str> = resources.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["raw/a.TSV", "raw/b.csv"]);
        assert_eq!(resources[0].delimiter, '\t');
    }

    #[test]
    fn test_no_source_found() {
        let store = store(json!({"resources": []}));
        let err = ResourceLocator::new(&store)
            .locate(&table(), &ResourceMap::new(), &ResourceMap::new())
            .unwrap_err();
        assert!(matches!(err, UploadError::NoSourceFound { .. }));
    }
}
