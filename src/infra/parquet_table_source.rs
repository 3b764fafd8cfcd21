use std::fs::File;
use std::path::PathBuf;

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::app::ports::TableSource;
use crate::error::{EtlError, Result};
use crate::infra::arrow_convert::record_batches_to_table;
use crate::table::Table;

/// Reads a Parquet file written by this pipeline back into a table
pub struct ParquetTableSource {
    path: PathBuf,
    table_name: String,
}

impl ParquetTableSource {
    pub fn new(path: impl Into<PathBuf>, table_name: &str) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.to_string(),
        }
    }
}

impl TableSource for ParquetTableSource {
    fn describe(&self) -> String {
        format!("parquet:{}", self.path.display())
    }

    fn load(&self) -> Result<Table> {
        let file = File::open(&self.path).map_err(|e| EtlError::unreadable(&self.path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Read {} record batches from {}", batches.len(), self.path.display());

        record_batches_to_table(&self.table_name, &schema, &batches)
    }
}
