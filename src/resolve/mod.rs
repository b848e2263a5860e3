//! Dependency resolution
//!
//! Fetches each requested table's live schema, builds the foreign-key graph
//! between them and computes a parents-first load order.

pub mod graph;

pub use graph::DependencyGraph;

use std::collections::HashMap;
use tracing::info;

use crate::api::TableStore;
use crate::error::{UploadError, UploadResult};
use crate::models::{TableRef, TableSchema};

/// Outcome of dependency resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Parents-first load order
    pub order: Vec<TableRef>,
    /// Dependency graph over the requested tables
    pub graph: DependencyGraph,
    /// Live schema of every requested table, fetched once
    pub schemas: HashMap<TableRef, TableSchema>,
}

/// Builds load orders from the store's constraint definitions
pub struct DependencyResolver<S> {
    store: S,
}

impl<S: TableStore> DependencyResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve the load order for `tables`.
    ///
    /// Duplicates collapse onto their first occurrence. A cycle among the
    /// requested tables fails with [`UploadError::CyclicDependency`]; a
    /// schema that cannot be fetched fails with [`UploadError::Api`].
    pub fn resolve(&self, tables: &[TableRef]) -> UploadResult<Resolution> {
        let mut graph = DependencyGraph::new();
        for table in tables {
            graph.add_table(table.clone());
        }

        let mut schemas = HashMap::with_capacity(graph.len());
        for table in graph.tables() {
            let schema = self
                .store
                .table_schema(table)
                .map_err(|source| UploadError::Api {
                    table: table.clone(),
                    source,
                })?;
            schemas.insert(table.clone(), schema);
        }

        let requested: Vec<TableRef> = graph.tables().cloned().collect();
        for child in &requested {
            if let Some(schema) = schemas.get(child) {
                for parent in schema.parent_tables() {
                    graph.add_dependency(child, &parent);
                }
            }
        }

        let order = graph.load_order()?;
        info!(
            "Upload order (parents -> children): {}",
            order
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Resolution {
            order,
            graph,
            schemas,
        })
    }
}
