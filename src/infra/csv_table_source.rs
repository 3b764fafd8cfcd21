use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::app::ports::TableSource;
use crate::error::{EtlError, Result};
use crate::table::{Column, Row, Table};
use crate::types::{ColumnType, Value};

/// Cell texts read as missing values
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Loads a headered CSV file into a table.
///
/// Each column is typed from its non-missing cells: integer if every cell
/// parses as one, then float, then boolean, otherwise text.
pub struct CsvTableSource {
    path: PathBuf,
    table_name: String,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>, table_name: &str) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.to_string(),
        }
    }
}

impl TableSource for CsvTableSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> Result<Table> {
        let file = File::open(&self.path).map_err(|e| EtlError::unreadable(&self.path, e))?;
        let table = read_csv(&self.table_name, &self.path.display().to_string(), file)?;
        info!(
            "Loaded {} rows with {} columns from {}",
            table.len(),
            table.columns().len(),
            self.path.display()
        );
        Ok(table)
    }
}

/// Parse CSV text from any reader into a table named `table_name`
pub fn read_csv<R: Read>(table_name: &str, location: &str, reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let names: Vec<String> = rdr
        .headers()
        .map_err(|e| EtlError::malformed(location, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| EtlError::malformed(location, e.to_string()))?;
        raw.push(record.iter().map(cell_text).collect());
    }
    debug!("Read {} CSV records with header {:?}", raw.len(), names);

    let column_types: Vec<ColumnType> = (0..names.len())
        .map(|i| infer_text_column(raw.iter().filter_map(|r| r[i].as_deref())))
        .collect();

    let rows: Vec<Row> = raw
        .into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .zip(&column_types)
                .map(|(cell, ty)| cell.map_or(Value::Null, |text| parse_cell(&text, *ty)))
                .collect()
        })
        .collect();

    let columns = names
        .into_iter()
        .zip(column_types)
        .map(|(name, ty)| Column::new(name, ty))
        .collect();

    Ok(Table::from_parts(table_name, columns, rows))
}

fn cell_text(raw: &str) -> Option<String> {
    if NA_VALUES.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn infer_text_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let mut cells = cells.peekable();
    if cells.peek().is_none() {
        return ColumnType::Null;
    }
    if cells.clone().all(|c| c.trim().parse::<i64>().is_ok()) {
        ColumnType::Int
    } else if cells.clone().all(|c| c.trim().parse::<f64>().is_ok()) {
        ColumnType::Float
    } else if cells.all(|c| parse_bool(c).is_some()) {
        ColumnType::Bool
    } else {
        ColumnType::Str
    }
}

fn parse_cell(text: &str, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Int => text.trim().parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Float => text
            .trim()
            .parse::<f64>()
            .map(|f| ColumnType::Float.coerce(Value::Float(f)))
            .unwrap_or(Value::Null),
        ColumnType::Bool => parse_bool(text).map(Value::Bool).unwrap_or(Value::Null),
        _ => Value::Str(text.to_string()),
    }
}
