// Infrastructure adapters: file formats behind the app::ports traits

pub mod arrow_convert;
pub mod atomic_file;
pub mod csv_table_source;
pub mod json_table_source;
pub mod parquet_table_sink;
pub mod parquet_table_source;

pub use csv_table_source::CsvTableSource;
pub use json_table_source::JsonTableSource;
pub use parquet_table_sink::ParquetTableSink;
pub use parquet_table_source::ParquetTableSource;
