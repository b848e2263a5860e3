//! Mapping of raw records onto destination columns

use super::normalize::ValueNormalizer;
use super::reader::RawRecord;
use crate::models::{ColumnSpec, Row, TableSchema};

/// Number of columns shown in a row head
const ROW_HEAD_COLUMNS: usize = 10;

/// Error type for a record that cannot become a row
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("column {column} is NOT NULL but value is missing/NULL (record {record}); row head: {row_head}")]
    RequiredValueMissing {
        column: String,
        record: usize,
        row_head: String,
    },
}

/// Builds rows for one destination table
#[derive(Debug, Clone)]
pub struct RowMapper {
    columns: Vec<ColumnSpec>,
    normalizer: ValueNormalizer,
}

impl RowMapper {
    pub fn new(schema: &TableSchema, normalizer: ValueNormalizer) -> Self {
        Self {
            columns: schema.columns.clone(),
            normalizer,
        }
    }

    /// Map a record to a row in destination column order.
    ///
    /// Source columns the table does not have are dropped. A null
    /// auto-increment key is omitted so the store can generate it.
    pub fn map(&self, record: &RawRecord) -> Result<Row, RowError> {
        let mut row = Row::new();
        for column in &self.columns {
            let value = self.normalizer.normalize(record.get(&column.name));
            if value.is_null() {
                if column.is_required() {
                    let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
                    return Err(RowError::RequiredValueMissing {
                        column: column.name.clone(),
                        record: record.number,
                        row_head: record.head(&names, ROW_HEAD_COLUMNS),
                    });
                }
                if column.is_auto_increment_pk {
                    continue;
                }
            }
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableRef;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn schema() -> TableSchema {
        TableSchema::new(
            TableRef::new("model_draft", "households"),
            vec![
                ColumnSpec::new("id").not_null().auto_increment_pk(),
                ColumnSpec::new("name").not_null(),
                ColumnSpec::new("members"),
                ColumnSpec::new("tags"),
            ],
        )
    }

    fn record(number: usize, fields: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            number,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_maps_in_column_order() {
        let mapper = RowMapper::new(&schema(), ValueNormalizer::default());
        let row = mapper
            .map(&record(
                1,
                &[("tags", "['a', 'b']"), ("name", " Smith "), ("id", "5"), ("unused", "x")],
            ))
            .unwrap();

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "members", "tags"]);
        assert_eq!(row["id"], json!("5"));
        assert_eq!(row["name"], json!("Smith"));
        assert_eq!(row["members"], Value::Null);
        assert_eq!(row["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_omits_null_auto_increment_key() {
        let mapper = RowMapper::new(&schema(), ValueNormalizer::default());
        let row = mapper.map(&record(1, &[("id", "NULL"), ("name", "x")])).unwrap();
        assert!(!row.contains_key("id"));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_required_value_missing() {
        let mapper = RowMapper::new(&schema(), ValueNormalizer::default());
        let err = mapper
            .map(&record(7, &[("id", "1"), ("name", "n/a")]))
            .unwrap_err();
        let RowError::RequiredValueMissing {
            column,
            record,
            row_head,
        } = err;
        assert_eq!(column, "name");
        assert_eq!(record, 7);
        assert!(row_head.contains(r#""name":"n/a""#));
    }

    #[test]
    fn test_nullable_columns_accept_null() {
        let mapper = RowMapper::new(&schema(), ValueNormalizer::default());
        let row = mapper
            .map(&record(2, &[("name", "x"), ("members", "none"), ("tags", "")]))
            .unwrap();
        assert_eq!(row["members"], Value::Null);
        assert_eq!(row["tags"], Value::Null);
    }
}
