//! Foreign key constraint model
//!
//! The remote store reports constraints as free-text definitions. The parsing
//! of those definitions lives here, isolated behind
//! [`ForeignKeyConstraint::parse_definition`], so that stores exposing
//! structured constraints can construct the value directly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TableRef;

static FOREIGN_KEY_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)FOREIGN\s+KEY\s*\((?P<local>[^)]+)\)\s*REFERENCES\s+(?:"?(?P<schema>\w+)"?\.)?"?(?P<table>\w+)"?\s*\((?P<referenced>[^)]+)\)"#,
    )
    .expect("Invalid regex")
});

/// A foreign key constraint declared on a child table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Columns on the child table
    pub local_columns: Vec<String>,
    /// Schema of the referenced (parent) table
    pub referenced_schema: String,
    /// Name of the referenced (parent) table
    pub referenced_table: String,
    /// Columns on the parent table
    pub referenced_columns: Vec<String>,
}

impl ForeignKeyConstraint {
    /// Parse a constraint definition such as
    /// `FOREIGN KEY (region_id) REFERENCES model_draft.region(id)`.
    ///
    /// When the definition omits the referenced schema, `default_schema`
    /// (normally the child table's schema) is used. Returns `None` when the
    /// text is not a foreign key definition.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oep_upload::models::ForeignKeyConstraint;
    ///
    /// let fk = ForeignKeyConstraint::parse_definition(
    ///     "FOREIGN KEY (region_id) REFERENCES model_draft.region(id)",
    ///     "sandbox",
    /// )
    /// .unwrap();
    /// assert_eq!(fk.referenced_schema, "model_draft");
    /// assert_eq!(fk.referenced_table, "region");
    /// assert_eq!(fk.local_columns, vec!["region_id".to_string()]);
    /// ```
    pub fn parse_definition(definition: &str, default_schema: &str) -> Option<Self> {
        let captures = FOREIGN_KEY_DEFINITION.captures(definition)?;
        let referenced_schema = captures
            .name("schema")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| default_schema.to_string());

        Some(Self {
            local_columns: split_columns(&captures["local"]),
            referenced_schema,
            referenced_table: captures["table"].to_string(),
            referenced_columns: split_columns(&captures["referenced"]),
        })
    }

    /// The table this constraint points at
    pub fn parent(&self) -> TableRef {
        TableRef::new(&self.referenced_schema, &self.referenced_table)
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
