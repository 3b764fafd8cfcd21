//! In-memory table passed by value between pipeline stages.

use crate::constants::is_metadata_column;
use crate::error::{EtlError, Result};
use crate::types::{ColumnType, Value};

pub type Row = Vec<Value>;

/// Named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered columns plus an ordered sequence of rows, one value per column
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// Column positions split into the metadata namespace and everything else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnClassification {
    pub identity: Vec<usize>,
    pub metadata: Vec<usize>,
}

impl ColumnClassification {
    /// Values of the identity columns, used as the dedup key
    pub fn identity_key(&self, row: &[Value]) -> Vec<Value> {
        self.identity.iter().map(|&i| row[i].clone()).collect()
    }
}

impl Table {
    /// Build a table from raw rows, inferring every column type.
    ///
    /// Rows must have exactly one value per column name.
    pub fn from_rows(name: &str, names: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(EtlError::malformed(
                name,
                format!("row {} has {} values, expected {}", i, row.len(), names.len()),
            ));
        }

        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                let column_type = ColumnType::infer(rows.iter().map(|r| &r[i]));
                Column::new(n, column_type)
            })
            .collect();

        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&columns)
                    .map(|(v, c)| c.column_type.coerce(v))
                    .collect()
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    /// Build a table whose column types are already known
    pub fn from_parts(name: &str, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            name: name.to_string(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<Row>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Position of a required column, or a schema error naming this table
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EtlError::missing_column(&self.name, name))
    }

    pub fn set_column_type(&mut self, index: usize, column_type: ColumnType) {
        self.columns[index].column_type = column_type;
    }

    /// Replace every value of one column, keeping row order
    pub fn map_column(&mut self, index: usize, mut f: impl FnMut(&Value) -> Value) {
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
    }

    /// Keep rows matching the predicate; returns how many were removed
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&Row) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    /// Split columns into metadata (`metadata.` prefix) and identity positions
    pub fn classify_columns(&self) -> ColumnClassification {
        let (metadata, identity): (Vec<usize>, Vec<usize>) = (0..self.columns.len())
            .partition(|&i| is_metadata_column(&self.columns[i].name));
        ColumnClassification { identity, metadata }
    }
}

/// Tables are equal when columns and rows match; the name is a label only
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}
