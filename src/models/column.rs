//! Live column and schema snapshot of a destination table

use serde::{Deserialize, Serialize};

use super::{ForeignKeyConstraint, TableRef};

/// Column definition as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Whether the column accepts NULL values (default: true)
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Primary key column whose value the store assigns itself (serial/identity)
    #[serde(default)]
    pub is_auto_increment_pk: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    /// Create a nullable, non-generated column
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            is_auto_increment_pk: false,
        }
    }

    /// Mark the column NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as an auto-increment primary key
    pub fn auto_increment_pk(mut self) -> Self {
        self.is_auto_increment_pk = true;
        self
    }

    /// Whether a row must carry a non-null value for this column
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.is_auto_increment_pk
    }
}

/// Snapshot of a destination table's columns and foreign keys.
///
/// Fetched once per table per run; never cached across runs since the live
/// schema may differ from what the manifest describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// The table this schema describes
    pub table: TableRef,
    /// Columns in store order
    pub columns: Vec<ColumnSpec>,
    /// Foreign keys declared on this table
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

impl TableSchema {
    /// Create a schema snapshot without foreign keys
    pub fn new(table: TableRef, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table,
            columns,
            foreign_keys: Vec::new(),
        }
    }

    /// Attach a foreign key constraint
    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyConstraint) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Column names in store order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Distinct parent tables referenced by foreign keys, in declaration order
    pub fn parent_tables(&self) -> Vec<TableRef> {
        let mut parents: Vec<TableRef> = Vec::new();
        for fk in &self.foreign_keys {
            let parent = fk.parent();
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        parents
    }
}
