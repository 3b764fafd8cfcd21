use std::fs::File;
use std::path::PathBuf;

use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, instrument};

use crate::app::ports::{StagedOutput, TableSink};
use crate::error::{EtlError, Result};
use crate::infra::arrow_convert::table_to_record_batch;
use crate::infra::atomic_file::{ensure_parent_dir, publish, staging_path, TempFileGuard};
use crate::table::Table;

/// Writes a table as a single Parquet file.
///
/// The file is written next to its destination as `<name>.tmp` and only
/// renamed into place on commit, so a failed run never leaves a partial
/// artifact at the destination.
pub struct ParquetTableSink {
    path: PathBuf,
}

impl ParquetTableSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSink for ParquetTableSink {
    fn describe(&self) -> String {
        format!("parquet:{}", self.path.display())
    }

    #[instrument(skip_all, fields(path = %self.path.display(), rows = table.len()))]
    fn stage(&self, table: &Table) -> Result<Box<dyn StagedOutput>> {
        ensure_parent_dir(&self.path)?;
        let tmp_path = staging_path(&self.path)?;

        let batch = table_to_record_batch(table)?;
        let file = File::create(&tmp_path).map_err(|e| EtlError::output(&tmp_path, e))?;
        let guard = TempFileGuard::new(tmp_path.clone());

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        // An empty table still produces a valid file carrying the schema
        if batch.num_rows() > 0 {
            writer.write(&batch)?;
        }
        writer.close()?;

        debug!("Staged {} rows at {}", table.len(), tmp_path.display());
        Ok(Box::new(StagedParquet {
            staged_path: tmp_path,
            final_path: self.path.clone(),
            rows: table.len(),
            guard,
        }))
    }
}

/// A Parquet file written to its staging path, awaiting rename
struct StagedParquet {
    staged_path: PathBuf,
    final_path: PathBuf,
    rows: usize,
    guard: TempFileGuard,
}

impl StagedOutput for StagedParquet {
    fn rows(&self) -> usize {
        self.rows
    }

    fn commit(mut self: Box<Self>) -> Result<PathBuf> {
        publish(&self.staged_path, &self.final_path)?;
        self.guard.disarm();
        Ok(self.final_path.clone())
    }
}
