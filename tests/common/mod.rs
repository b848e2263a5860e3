//! In-memory table store shared by the integration tests

#![allow(dead_code)]

use oep_upload::api::{ApiError, RowWriter, TableStore, WriteResponse};
use oep_upload::models::{ColumnSpec, ForeignKeyConstraint, Row, TableRef, TableSchema};
use oep_upload::upload::Sleeper;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn t(name: &str) -> TableRef {
    TableRef::new("model_draft", name)
}

/// Schema with the given columns and foreign keys to `parents`
pub fn schema(name: &str, columns: Vec<ColumnSpec>, parents: &[&str]) -> TableSchema {
    let mut schema = TableSchema::new(t(name), columns);
    for parent in parents {
        let definition = format!(
            "FOREIGN KEY ({parent}_id) REFERENCES model_draft.{parent}(id)"
        );
        let fk = ForeignKeyConstraint::parse_definition(&definition, "model_draft")
            .expect("valid definition");
        schema = schema.with_foreign_key(fk);
    }
    schema
}

/// Serial `id` plus a NOT NULL `name` and a nullable `note`
pub fn simple_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id").not_null().auto_increment_pk(),
        ColumnSpec::new("name").not_null(),
        ColumnSpec::new("note"),
    ]
}

#[derive(Default)]
pub struct FakeStore {
    schemas: HashMap<TableRef, TableSchema>,
    metadata: HashMap<TableRef, Value>,
    statuses: Mutex<VecDeque<u16>>,
    posts: Mutex<Vec<(TableRef, Vec<Row>)>>,
}

impl FakeStore {
    pub fn new(schemas: Vec<TableSchema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(|s| (s.table.clone(), s)).collect(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, table: &str, metadata: Value) -> Self {
        self.metadata.insert(t(table), metadata);
        self
    }

    /// Statuses returned by the next writes; 201 once exhausted
    pub fn with_statuses(self, statuses: &[u16]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    /// (table, row count) of every write, in order
    pub fn posts(&self) -> Vec<(TableRef, usize)> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(table, rows)| (table.clone(), rows.len()))
            .collect()
    }

    /// Every row written to a table
    pub fn rows_for(&self, table: &str) -> Vec<Row> {
        let table = t(table);
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(posted, _)| *posted == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }
}

impl TableStore for FakeStore {
    fn table_schema(&self, table: &TableRef) -> Result<TableSchema, ApiError> {
        self.schemas.get(table).cloned().ok_or_else(|| ApiError::Status {
            url: format!("schema/{}/tables/{}", table.schema, table.name),
            status: 404,
            body: "not found".into(),
        })
    }

    fn table_metadata(&self, table: &TableRef) -> Result<Value, ApiError> {
        Ok(self.metadata.get(table).cloned().unwrap_or_else(|| json!({})))
    }
}

impl RowWriter for FakeStore {
    fn post_rows(&self, table: &TableRef, rows: &[Row]) -> Result<WriteResponse, ApiError> {
        self.posts
            .lock()
            .unwrap()
            .push((table.clone(), rows.to_vec()));
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(201);
        Ok(WriteResponse::new(status, json!({"status": status})))
    }
}

/// Sleeper that records requested delays instead of sleeping
pub fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delays);
    let sleeper: Sleeper = Arc::new(move |d| sink.lock().unwrap().push(d));
    (sleeper, delays)
}

pub fn write_csv(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
