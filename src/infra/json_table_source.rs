use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::app::ports::TableSource;
use crate::error::{EtlError, Result};
use crate::table::{Row, Table};
use crate::types::Value;

/// Loads a JSON array of records into a table.
///
/// Nested objects are flattened into dot-separated column names
/// (`{"metadata": {"ip": ..}}` becomes `metadata.ip`). Columns appear in
/// first-seen order across records; a record missing a column gets null.
pub struct JsonTableSource {
    path: PathBuf,
    table_name: String,
}

impl JsonTableSource {
    pub fn new(path: impl Into<PathBuf>, table_name: &str) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.to_string(),
        }
    }
}

impl TableSource for JsonTableSource {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn load(&self) -> Result<Table> {
        let location = self.path.display().to_string();
        let document: JsonValue = {
            let file = File::open(&self.path).map_err(|e| EtlError::unreadable(&self.path, e))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| EtlError::malformed(&location, e.to_string()))?
        };

        let table = records_to_table(&self.table_name, &location, document)?;
        info!("Loaded {} rows with {} columns from {}", table.len(), table.columns().len(), location);
        Ok(table)
    }
}

/// Flatten JSON records into a table named `table_name`
pub fn records_to_table(table_name: &str, location: &str, document: JsonValue) -> Result<Table> {
    let records = match document {
        JsonValue::Array(items) => items,
        obj @ JsonValue::Object(_) => vec![obj],
        other => {
            return Err(EtlError::malformed(
                location,
                format!("expected an array of objects, found {}", json_kind(&other)),
            ))
        }
    };

    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut sparse: Vec<Vec<(usize, Value)>> = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let JsonValue::Object(fields) = record else {
            return Err(EtlError::malformed(
                location,
                format!("record {} is {}, expected an object", i, json_kind(record)),
            ));
        };

        let mut flat = Vec::new();
        flatten_object("", fields, &mut flat);

        let cells = flat
            .into_iter()
            .map(|(name, value)| {
                let idx = *positions.entry(name.clone()).or_insert_with(|| {
                    names.push(name);
                    names.len() - 1
                });
                (idx, value)
            })
            .collect();
        sparse.push(cells);
    }
    debug!("Flattened {} records into {} columns", sparse.len(), names.len());

    let width = names.len();
    let rows: Vec<Row> = sparse
        .into_iter()
        .map(|cells| {
            let mut row = vec![Value::Null; width];
            for (idx, value) in cells {
                row[idx] = value;
            }
            row
        })
        .collect();

    Table::from_rows(table_name, names, rows)
}

fn flatten_object(prefix: &str, fields: &Map<String, JsonValue>, out: &mut Vec<(String, Value)>) {
    for (key, value) in fields {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            JsonValue::Object(nested) => flatten_object(&name, nested, out),
            scalar => out.push((name, Value::from_json(scalar))),
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flattens_nested_metadata() {
        let doc = json!([
            {"user_id": 1, "timestamp": "2024-01-01", "metadata": {"ip": "1.1.1.1", "geo": {"city": "NYC"}}},
            {"user_id": 2, "timestamp": "2024-01-02", "action": "click"}
        ]);

        let table = records_to_table("events", "inline", doc).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["user_id", "timestamp", "metadata.ip", "metadata.geo.city", "action"]
        );
        assert_eq!(table.rows()[1][2], Value::Null);
        assert_eq!(table.rows()[1][4], Value::from("click"));
        assert_eq!(table.columns()[0].column_type, ColumnType::Int);
    }

    #[test]
    fn test_single_object_is_one_record() {
        let table = records_to_table("events", "inline", json!({"user_id": 7})).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_non_object_records_are_malformed() {
        let err = records_to_table("events", "inline", json!([1, 2])).unwrap_err();
        assert!(matches!(err, EtlError::MalformedSource { .. }));

        let err = records_to_table("events", "inline", json!("text")).unwrap_err();
        assert!(matches!(err, EtlError::MalformedSource { .. }));
    }

    #[test]
    fn test_load_reports_bad_json_and_missing_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[{{\"user_id\": 1,").unwrap();
        let err = JsonTableSource::new(file.path(), "events").load().unwrap_err();
        assert!(matches!(err, EtlError::MalformedSource { .. }));

        let err = JsonTableSource::new("/definitely/not/here.json", "events").load().unwrap_err();
        assert!(matches!(err, EtlError::Source { .. }));
    }
}
