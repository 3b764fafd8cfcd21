use std::path::PathBuf;
use thiserror::Error;

use crate::types::ColumnType;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Failed to read source '{}': {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed source '{path}': {reason}")]
    MalformedSource { path: String, reason: String },

    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Column '{column}' holds a value that is not a date-time: {value}")]
    NotADateTime { column: String, value: String },

    #[error("Column '{column}' is typed {expected} but holds '{value}'")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("Unsupported column type for '{column}': {data_type}")]
    UnsupportedColumnType { column: String, data_type: String },

    #[error("Failed to write output '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EtlError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        EtlError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        EtlError::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Source {
            path: path.into(),
            source,
        }
    }

    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Output {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
