//! Package manifest (`datapackage.json`) support
//!
//! The manifest names the dataset and lists its resources. Each resource
//! with a `name` and a local CSV/TSV `path` becomes a source file for the
//! table of that name.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::models::{ResourceMap, SourceResource, TableRef};

/// Default manifest filename
pub const MANIFEST_FILENAME: &str = "datapackage.json";

/// Error type for manifest loading
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read manifest {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse manifest: {0}")]
    Parse(String),
}

/// Parsed `datapackage.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Raw resource descriptors; a non-list value is read as empty
    #[serde(default, deserialize_with = "resource_list")]
    pub resources: Vec<Value>,
}

fn resource_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

impl Manifest {
    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse a manifest from a JSON string
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Trimmed dataset name, if present and non-empty
    pub fn dataset_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// Map normalized table names to their local tabular resources
    pub fn resource_map(&self) -> ResourceMap {
        let mut map = ResourceMap::new();
        for descriptor in &self.resources {
            let Some(table) = resource_name(descriptor) else {
                continue;
            };
            if let Some(resource) = SourceResource::from_descriptor(descriptor) {
                map.insert(table, resource);
            }
        }
        map
    }

    /// Tables with at least one local resource, in manifest order
    pub fn table_names(&self) -> Vec<String> {
        self.resource_map().tables().to_vec()
    }

    /// Every named resource as a table reference.
    ///
    /// A string `schema` field on the resource wins over `default_schema`.
    /// Duplicates are dropped.
    pub fn dataset_tables(&self, default_schema: &str) -> Vec<TableRef> {
        let mut tables: Vec<TableRef> = Vec::new();
        for descriptor in &self.resources {
            let Some(name) = resource_name(descriptor) else {
                continue;
            };
            let schema = descriptor
                .get("schema")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default_schema);
            let table = TableRef::parse(name, schema);
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        tables
    }
}

fn resource_name(descriptor: &Value) -> Option<&str> {
    descriptor
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "name": "household_survey",
        "title": "Household Survey",
        "@id": "https://example.org/datasets/household_survey",
        "resources": [
            {"name": "Households", "path": "data/households.csv"},
            {"name": "persons", "path": "data/persons.tsv", "dialect": {"encoding": "latin1"}},
            {"name": "households", "path": "data/households_2.csv"},
            {"name": "remote", "path": "https://example.org/remote.csv"},
            {"name": "", "path": "data/anonymous.csv"},
            {"name": "sandbox.notes", "path": "notes.json", "schema": {"fields": []}},
            "not-an-object"
        ]
    }"#;

    #[test]
    fn test_parse_fields() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.dataset_name(), Some("household_survey"));
        assert_eq!(manifest.title.as_deref(), Some("Household Survey"));
        assert!(manifest.description.is_none());
        assert_eq!(
            manifest.id.as_deref(),
            Some("https://example.org/datasets/household_survey")
        );
        assert_eq!(manifest.resources.len(), 7);
    }

    #[test]
    fn test_resource_map() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let map = manifest.resource_map();
        assert_eq!(
            manifest.table_names(),
            vec!["households".to_string(), "persons".to_string()]
        );

        let households = map.get("households");
        assert_eq!(households.len(), 2);
        assert_eq!(households[0].path, "data/households.csv");
        assert_eq!(households[1].path, "data/households_2.csv");

        let persons = map.get("persons");
        assert_eq!(persons[0].delimiter, '\t');
        assert_eq!(persons[0].encoding, "latin1");
        assert!(map.get("remote").is_empty());
    }

    #[test]
    fn test_dataset_tables() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let tables = manifest.dataset_tables("model_draft");
        assert_eq!(
            tables,
            vec![
                TableRef::new("model_draft", "households"),
                TableRef::new("model_draft", "persons"),
                TableRef::new("model_draft", "remote"),
                TableRef::new("sandbox", "notes"),
            ]
        );
    }

    #[test]
    fn test_non_list_resources_are_empty() {
        let manifest = Manifest::parse(r#"{"name": "x", "resources": {"a": 1}}"#).unwrap();
        assert!(manifest.resources.is_empty());
        assert!(manifest.resource_map().is_empty());
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILENAME);
        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::NotFound(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Manifest::load(&path), Err(ManifestError::Parse(_))));

        std::fs::write(&path, SAMPLE).unwrap();
        assert!(Manifest::load(&path).is_ok());
    }
}
