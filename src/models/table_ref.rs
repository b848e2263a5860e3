//! Table identity model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize any table identifier to its lookup key.
///
/// Whitespace is trimmed, a leading `schema.` qualifier is dropped and the
/// remainder is lowercased.
///
/// # Example
///
/// ```rust
/// use oep_upload::models::normalize_table_key;
///
/// assert_eq!(normalize_table_key(" Model_Draft.My_Table "), "my_table");
/// assert_eq!(normalize_table_key("plain"), "plain");
/// ```
pub fn normalize_table_key(name: &str) -> String {
    let name = name.trim();
    let bare = match name.split_once('.') {
        Some((_, table)) => table,
        None => name,
    };
    bare.trim().to_lowercase()
}

/// Reference to a table in the remote store.
///
/// Identity is the `(schema, name)` pair. The name is always stored in its
/// normalized form so that manifest keys, CLI arguments and constraint
/// definitions agree on the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema the table lives in
    pub schema: String,
    /// Normalized table name
    pub name: String,
}

impl TableRef {
    /// Create a reference from an explicit schema and table name
    pub fn new(schema: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            schema: schema.as_ref().trim().to_string(),
            name: normalize_table_key(name.as_ref()),
        }
    }

    /// Parse `"table"` or `"schema.table"`, falling back to `default_schema`
    ///
    /// # Example
    ///
    /// ```rust
    /// use oep_upload::models::TableRef;
    ///
    /// let qualified = TableRef::parse("sandbox.Households", "model_draft");
    /// assert_eq!(qualified.schema, "sandbox");
    /// assert_eq!(qualified.name, "households");
    ///
    /// let bare = TableRef::parse("households", "model_draft");
    /// assert_eq!(bare.schema, "model_draft");
    /// ```
    pub fn parse(ident: &str, default_schema: &str) -> Self {
        let ident = ident.trim();
        match ident.split_once('.') {
            Some((schema, table)) if !schema.trim().is_empty() => Self::new(schema, table),
            Some((_, table)) => Self::new(default_schema, table),
            None => Self::new(default_schema, ident),
        }
    }

    /// Key used to look the table up in manifest and override maps
    pub fn key(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
