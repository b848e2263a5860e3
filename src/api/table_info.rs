//! Conversion of the store's table description into a [`TableSchema`]
//!
//! Expected shape:
//!
//! ```json
//! {
//!   "columns": {"id": {"is_nullable": false, "column_default": "nextval('x_id_seq')"}},
//!   "constraints": {"x_fk": {"constraint_type": "FOREIGN KEY", "definition": "FOREIGN KEY ..."}}
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{ColumnSpec, ForeignKeyConstraint, TableRef, TableSchema};

static PRIMARY_KEY_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]+)\)").expect("Invalid regex"));

/// Build a schema snapshot from a `GET /schema/{schema}/tables/{table}` body.
///
/// A column is treated as an auto-increment primary key when its default
/// draws from a sequence (`nextval(`) or the store flags it as an identity
/// column, and it is part of the primary key. When the store reports no
/// primary key constraint, a column named `id` is assumed to be the key.
pub fn parse_table_info(table: &TableRef, info: &Value) -> Result<TableSchema, String> {
    let columns = info
        .get("columns")
        .and_then(Value::as_object)
        .ok_or_else(|| format!("table description for {} has no 'columns' object", table))?;

    let empty = Map::new();
    let constraints = info
        .get("constraints")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut foreign_keys = Vec::new();
    let mut primary_key: Option<Vec<String>> = None;

    for (id, constraint) in constraints {
        let kind = constraint
            .get("constraint_type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_uppercase();
        let definition = constraint
            .get("definition")
            .and_then(Value::as_str)
            .unwrap_or("");

        match kind.as_str() {
            "FOREIGN KEY" => match ForeignKeyConstraint::parse_definition(definition, &table.schema)
            {
                Some(fk) => foreign_keys.push(fk),
                None => debug!(
                    "Skipping unparseable foreign key {} on {}: {}",
                    id, table, definition
                ),
            },
            "PRIMARY KEY" => {
                if let Some(captures) = PRIMARY_KEY_DEFINITION.captures(definition) {
                    primary_key.get_or_insert_with(Vec::new).extend(
                        captures[1]
                            .split(',')
                            .map(|c| c.trim().trim_matches('"').to_string()),
                    );
                }
            }
            _ => {}
        }
    }

    let columns = columns
        .iter()
        .map(|(name, definition)| {
            let is_pk = match &primary_key {
                Some(keys) => keys.iter().any(|k| k == name),
                None => name == "id",
            };
            ColumnSpec {
                name: name.clone(),
                nullable: is_nullable(definition),
                is_auto_increment_pk: is_pk && is_generated(definition),
            }
        })
        .collect();

    Ok(TableSchema {
        table: table.clone(),
        columns,
        foreign_keys,
    })
}

fn is_nullable(definition: &Value) -> bool {
    match definition.get("is_nullable") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !matches!(s.trim().to_uppercase().as_str(), "NO" | "FALSE"),
        _ => true,
    }
}

fn is_generated(definition: &Value) -> bool {
    let sequence_default = definition
        .get("column_default")
        .and_then(Value::as_str)
        .map(|d| d.to_lowercase().contains("nextval("))
        .unwrap_or(false);
    let identity = match definition.get("is_identity") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("YES"),
        _ => false,
    };
    sequence_default || identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> TableRef {
        TableRef::new("model_draft", "child")
    }

    #[test]
    fn test_parse_columns_and_serial_id() {
        let info = json!({
            "columns": {
                "id": {"is_nullable": false, "column_default": "nextval('child_id_seq'::regclass)"},
                "name": {"is_nullable": "NO", "column_default": null},
                "comment": {"is_nullable": "YES"},
                "extra": null
            },
            "constraints": {}
        });
        let schema = parse_table_info(&table(), &info).unwrap();
        let names: Vec<&str> = schema.column_names().collect();
        assert_eq!(names, vec!["id", "name", "comment", "extra"]);

        let id = schema.column("id").unwrap();
        assert!(id.is_auto_increment_pk);
        assert!(!id.is_required());
        assert!(schema.column("name").unwrap().is_required());
        assert!(schema.column("comment").unwrap().nullable);
        assert!(schema.column("extra").unwrap().nullable);
    }

    #[test]
    fn test_parse_constraints() {
        let info = json!({
            "columns": {
                "key": {"is_nullable": false, "is_identity": "YES"},
                "id": {"is_nullable": false, "column_default": "nextval('s')"},
                "parent_id": {"is_nullable": true}
            },
            "constraints": {
                "child_pkey": {"constraint_type": "PRIMARY KEY", "definition": "PRIMARY KEY (key)"},
                "child_parent_fk": {
                    "constraint_type": "foreign key",
                    "definition": "FOREIGN KEY (parent_id) REFERENCES model_draft.parent(id)"
                },
                "broken_fk": {"constraint_type": "FOREIGN KEY", "definition": "garbage"},
                "check": {"constraint_type": "CHECK", "definition": "CHECK (parent_id > 0)"}
            }
        });
        let schema = parse_table_info(&table(), &info).unwrap();
        assert!(schema.column("key").unwrap().is_auto_increment_pk);
        // not part of the declared primary key
        assert!(!schema.column("id").unwrap().is_auto_increment_pk);
        assert_eq!(
            schema.parent_tables(),
            vec![TableRef::new("model_draft", "parent")]
        );
    }

    #[test]
    fn test_missing_columns_is_error() {
        let err = parse_table_info(&table(), &json!({"detail": "not found"})).unwrap_err();
        assert!(err.contains("columns"));
    }
}
