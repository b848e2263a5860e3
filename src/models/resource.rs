//! Source resource model
//!
//! A resource is one local tabular file plus the parameters needed to read
//! it, destined for exactly one table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::normalize_table_key;

/// Encoding used when a resource does not declare one: UTF-8 with an
/// optional byte-order mark
pub const DEFAULT_ENCODING: &str = "utf-8-sig";

/// Delimiter used when neither the dialect nor the extension decides
pub const DEFAULT_DELIMITER: char = ',';

/// Whether a string is an HTTP(S) URL
pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Accept local CSV/TSV files purely by extension, case-insensitive
pub fn looks_tabular_path(path: &str) -> bool {
    let path = path.trim();
    if path.is_empty() || is_url(path) {
        return false;
    }
    let lower = path.to_lowercase();
    lower.ends_with(".csv") || lower.ends_with(".tsv")
}

/// Tab for `.tsv`, comma for everything else
pub fn guess_delimiter(path: &str) -> char {
    if path.trim().to_lowercase().ends_with(".tsv") {
        '\t'
    } else {
        DEFAULT_DELIMITER
    }
}

/// One source file with its read parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResource {
    /// Path as written in the manifest or metadata
    pub path: String,
    /// Field delimiter
    pub delimiter: char,
    /// Character encoding label
    pub encoding: String,
}

impl SourceResource {
    /// Create a resource with defaults derived from the path
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let delimiter = guess_delimiter(&path);
        Self {
            path,
            delimiter,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }

    /// Create a resource from optional dialect settings.
    ///
    /// The delimiter is only honoured when it is exactly one character.
    pub fn with_dialect(
        path: impl Into<String>,
        delimiter: Option<&str>,
        encoding: Option<&str>,
    ) -> Self {
        let mut resource = Self::new(path);
        if let Some(delimiter) = delimiter {
            let mut chars = delimiter.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                resource.delimiter = c;
            }
        }
        if let Some(encoding) = encoding.map(str::trim).filter(|e| !e.is_empty()) {
            resource.encoding = encoding.to_string();
        }
        resource
    }

    /// Build a resource from a manifest-style descriptor object:
    /// `{"path": ..., "encoding": ..., "dialect": {"delimiter": ..., "encoding": ...}}`.
    ///
    /// Returns `None` unless the descriptor has a local tabular `path`.
    pub fn from_descriptor(descriptor: &Value) -> Option<Self> {
        let object = descriptor.as_object()?;
        let path = object.get("path")?.as_str()?.trim();
        if !looks_tabular_path(path) {
            return None;
        }

        let dialect = object.get("dialect").and_then(Value::as_object);
        let delimiter = dialect
            .and_then(|d| d.get("delimiter"))
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty());
        let encoding = object
            .get("encoding")
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
            .or_else(|| {
                dialect
                    .and_then(|d| d.get("encoding"))
                    .and_then(Value::as_str)
            });

        Some(Self::with_dialect(path, delimiter, encoding))
    }

    /// Resolve the path against the data root.
    ///
    /// - absolute and existing: used as-is
    /// - absolute but missing: `data_root/<file name>`
    /// - relative: `data_root/<path>`
    pub fn resolve_path(&self, data_root: &Path) -> PathBuf {
        let raw = Path::new(self.path.trim());
        if raw.is_absolute() {
            if raw.exists() {
                return raw.to_path_buf();
            }
            return match raw.file_name() {
                Some(name) => data_root.join(name),
                None => data_root.to_path_buf(),
            };
        }
        data_root.join(raw)
    }
}

/// Table-name-to-resources map keyed by normalized table name.
///
/// Keys keep their first-seen order so that tables taken from a manifest
/// are requested in the order the manifest lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    order: Vec<String>,
    entries: HashMap<String, Vec<SourceResource>>,
}

impl ResourceMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource for a table (the key is normalized)
    pub fn insert(&mut self, table: &str, resource: SourceResource) {
        let key = normalize_table_key(table);
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.entry(key).or_default().push(resource);
    }

    /// Resources for a table, empty when unknown
    pub fn get(&self, table: &str) -> &[SourceResource] {
        self.entries
            .get(&normalize_table_key(table))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Normalized table keys in first-seen order
    pub fn tables(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl<S: AsRef<str>> FromIterator<(S, SourceResource)> for ResourceMap {
    fn from_iter<I: IntoIterator<Item = (S, SourceResource)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (table, resource) in iter {
            map.insert(table.as_ref(), resource);
        }
        map
    }
}
