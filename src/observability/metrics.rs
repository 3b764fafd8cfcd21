//! Metrics for the ETL run.
//!
//! Recording goes through the `metrics` facade, so every function here is a
//! no-op until a recorder is installed with [`init`]. Names follow the
//! Prometheus conventions (`_total` counters, `_seconds` histograms).

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::infra::atomic_file::write_atomic;

/// Environment variable naming the textfile-collector output path
pub const TEXTFILE_ENV: &str = "ETL_METRICS_TEXTFILE";

/// Every metric name used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Stage metrics
    StageRowsIn,
    StageRowsOut,
    StageRowsDropped,
    StageDuration,

    // Source and sink metrics
    SourceRowsLoaded,
    SinkRowsWritten,

    // Run metrics
    RunsSuccess,
    RunsError,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageRowsIn => "etl_stage_rows_in_total",
            MetricName::StageRowsOut => "etl_stage_rows_out_total",
            MetricName::StageRowsDropped => "etl_stage_rows_dropped_total",
            MetricName::StageDuration => "etl_stage_duration_seconds",

            MetricName::SourceRowsLoaded => "etl_source_rows_loaded_total",
            MetricName::SinkRowsWritten => "etl_sink_rows_written_total",

            MetricName::RunsSuccess => "etl_runs_success_total",
            MetricName::RunsError => "etl_runs_error_total",
            MetricName::RunDuration => "etl_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder
pub fn init() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EtlError::Metrics(format!("Failed to install Prometheus recorder: {}", e)))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| EtlError::Metrics("metrics recorder already initialized".to_string()))?;

    info!("Metrics system initialized");
    Ok(())
}

/// Current snapshot in the Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Write the snapshot to `$ETL_METRICS_TEXTFILE` when that variable is set
pub fn export_textfile() -> Result<()> {
    match std::env::var(TEXTFILE_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            let Some(snapshot) = render() else {
                debug!("No metrics recorder installed, skipping textfile export");
                return Ok(());
            };
            write_snapshot(Path::new(path.trim()), &snapshot)?;
            info!("📈 Metrics snapshot written to {}", path.trim());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn write_snapshot(path: &Path, snapshot: &str) -> Result<()> {
    write_atomic(path, snapshot.as_bytes())
}

// ============================================================================
// Stage Metrics
// ============================================================================

pub mod stages {
    use std::time::Duration;

    use super::MetricName;
    use crate::pipeline::StageReport;

    /// Record the row accounting and wall time of a finished stage
    pub fn stage_completed(report: &StageReport, elapsed: Duration) {
        let stage = report.stage.as_str();

        ::metrics::counter!(MetricName::StageRowsIn.as_str(), "stage" => stage)
            .increment(report.rows_in as u64);
        ::metrics::counter!(MetricName::StageRowsOut.as_str(), "stage" => stage)
            .increment(report.rows_out as u64);

        for (reason, count) in &report.dropped {
            ::metrics::counter!(
                MetricName::StageRowsDropped.as_str(),
                "stage" => stage,
                "reason" => reason.as_str()
            )
            .increment(*count as u64);
        }

        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage)
            .record(elapsed.as_secs_f64());
    }
}

// ============================================================================
// Source / Sink Metrics
// ============================================================================

pub mod io {
    use super::MetricName;

    /// Record rows read from an input table
    pub fn rows_loaded(table: &str, rows: usize) {
        ::metrics::counter!(MetricName::SourceRowsLoaded.as_str(), "table" => table.to_string())
            .increment(rows as u64);
    }

    /// Record rows published in an output artifact
    pub fn rows_written(table: &str, rows: usize) {
        ::metrics::counter!(MetricName::SinkRowsWritten.as_str(), "table" => table.to_string())
            .increment(rows as u64);
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use std::time::Duration;

    use super::MetricName;

    pub fn success(elapsed: Duration) {
        ::metrics::counter!(MetricName::RunsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(elapsed.as_secs_f64());
    }

    pub fn error(elapsed: Duration) {
        ::metrics::counter!(MetricName::RunsError.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(elapsed.as_secs_f64());
    }
}
