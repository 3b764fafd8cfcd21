use std::path::PathBuf;

use crate::error::Result;
use crate::table::Table;

/// Tabular loader: reads one source completely into a table
pub trait TableSource {
    /// Where the table comes from, for logs and errors
    fn describe(&self) -> String;

    fn load(&self) -> Result<Table>;
}

/// Tabular writer. `stage` writes the full artifact somewhere invisible to
/// readers; the destination only changes when the staged output is committed.
pub trait TableSink {
    fn describe(&self) -> String;

    fn stage(&self, table: &Table) -> Result<Box<dyn StagedOutput>>;
}

/// A fully written artifact awaiting publication. Dropping it uncommitted
/// discards the staged bytes.
pub trait StagedOutput {
    fn rows(&self) -> usize;

    /// Publish the artifact at its destination and return that path
    fn commit(self: Box<Self>) -> Result<PathBuf>;
}
