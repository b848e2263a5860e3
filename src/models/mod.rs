//! Models module
//!
//! Defines the data structures that flow through an upload run: table
//! identities, live schema snapshots, foreign keys, source resources and rows.

pub mod column;
pub mod foreign_key;
pub mod resource;
pub mod table_ref;

pub use column::{ColumnSpec, TableSchema};
pub use foreign_key::ForeignKeyConstraint;
pub use resource::{
    DEFAULT_DELIMITER, DEFAULT_ENCODING, ResourceMap, SourceResource, guess_delimiter, is_url,
    looks_tabular_path,
};
pub use table_ref::{TableRef, normalize_table_key};

/// A normalized row: column name to JSON value, in destination column order
pub type Row = serde_json::Map<String, serde_json::Value>;
