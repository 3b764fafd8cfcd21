use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument};

use crate::app::ports::{StagedOutput, TableSink, TableSource};
use crate::config::Config;
use crate::constants::{ENRICHED_TABLE, EVENTS_TABLE, SUMMARY_TABLE, USERS_TABLE};
use crate::error::Result;
use crate::infra::{CsvTableSource, JsonTableSource, ParquetTableSink};
use crate::observability::metrics;
use crate::pipeline::processing::{
    Aggregator, Cleaner, DailyAggregator, Enricher, EventCleaner, SegmentEnricher,
};
use crate::pipeline::{Stage, StageReport};
use crate::table::Table;

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per stage, in execution order
    pub reports: Vec<StageReport>,
    pub enriched_rows: usize,
    pub summary_rows: usize,
    /// Published artifact paths: enriched first, then summary
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }
}

/// Use case for one batch run: load, clean, enrich, aggregate, write
pub struct EtlUseCase {
    events_source: Box<dyn TableSource>,
    users_source: Box<dyn TableSource>,
    cleaner: Box<dyn Cleaner>,
    enricher: Box<dyn Enricher>,
    aggregator: Box<dyn Aggregator>,
    enriched_sink: Box<dyn TableSink>,
    summary_sink: Box<dyn TableSink>,
}

impl EtlUseCase {
    /// Create a use case with the default cleaning, enrichment and aggregation stages
    pub fn with_default_stages(
        events_source: Box<dyn TableSource>,
        users_source: Box<dyn TableSource>,
        enriched_sink: Box<dyn TableSink>,
        summary_sink: Box<dyn TableSink>,
    ) -> Self {
        Self {
            events_source,
            users_source,
            cleaner: Box::new(EventCleaner::new()),
            enricher: Box::new(SegmentEnricher::new()),
            aggregator: Box::new(DailyAggregator::new()),
            enriched_sink,
            summary_sink,
        }
    }

    /// JSON events, CSV users and Parquet outputs at the configured paths
    pub fn from_config(config: &Config) -> Self {
        Self::with_default_stages(
            Box::new(JsonTableSource::new(&config.events_path, EVENTS_TABLE)),
            Box::new(CsvTableSource::new(&config.users_path, USERS_TABLE)),
            Box::new(ParquetTableSink::new(&config.enriched_output_path)),
            Box::new(ParquetTableSink::new(&config.summary_output_path)),
        )
    }

    /// Execute every stage in order. The first error aborts the run and no
    /// destination is replaced unless both artifacts were staged.
    #[instrument(skip_all)]
    pub fn run(&self) -> Result<RunSummary> {
        info!("🚀 ETL pipeline starting...");

        let events = self.load(self.events_source.as_ref(), EVENTS_TABLE)?;
        let users = self.load(self.users_source.as_ref(), USERS_TABLE)?;

        let started = Instant::now();
        let (cleaned, clean_report) = self.cleaner.clean(events)?;
        metrics::stages::stage_completed(&clean_report, started.elapsed());
        log_report(&clean_report);

        let started = Instant::now();
        let (enriched, enrich_report) = self.enricher.enrich(cleaned, users)?;
        metrics::stages::stage_completed(&enrich_report, started.elapsed());
        log_report(&enrich_report);

        let started = Instant::now();
        let (summary, aggregate_report) = self.aggregator.aggregate(&enriched)?;
        metrics::stages::stage_completed(&aggregate_report, started.elapsed());
        log_report(&aggregate_report);

        // Stage both artifacts before publishing either one
        let staged_enriched = stage(self.enriched_sink.as_ref(), enriched, ENRICHED_TABLE)?;
        let staged_summary = stage(self.summary_sink.as_ref(), summary, SUMMARY_TABLE)?;

        let enriched_rows = staged_enriched.rows();
        let summary_rows = staged_summary.rows();
        let outputs = vec![
            publish(staged_enriched, ENRICHED_TABLE)?,
            publish(staged_summary, SUMMARY_TABLE)?,
        ];

        info!("✅ ETL pipeline completed successfully");
        Ok(RunSummary {
            reports: vec![clean_report, enrich_report, aggregate_report],
            enriched_rows,
            summary_rows,
            outputs,
        })
    }

    fn load(&self, source: &dyn TableSource, table: &str) -> Result<Table> {
        info!("📥 Loading {} from {}", table, source.describe());
        let loaded = source.load()?;
        metrics::io::rows_loaded(table, loaded.len());
        Ok(loaded)
    }
}

fn stage(sink: &dyn TableSink, table: Table, name: &str) -> Result<Box<dyn StagedOutput>> {
    info!("📝 Staging {} rows of {} at {}", table.len(), name, sink.describe());
    sink.stage(&table.with_name(name))
}

fn publish(staged: Box<dyn StagedOutput>, table: &str) -> Result<PathBuf> {
    let rows = staged.rows();
    let path = staged.commit()?;
    metrics::io::rows_written(table, rows);
    info!("💾 Wrote {} rows to {}", rows, path.display());
    Ok(path)
}

fn log_report(report: &StageReport) {
    match report.stage {
        Stage::Clean => {
            info!("Initial row count: {}", report.rows_in);
            log_drops(report);
            info!("Remaining rows after cleaning: {}", report.rows_out);
        }
        Stage::Enrich => {
            log_drops(report);
            info!("Row count after join + filter: {}", report.rows_out);
        }
        Stage::Aggregate => {
            info!(
                "📊 Aggregated {} enriched rows into {} daily summary rows",
                report.rows_in, report.rows_out
            );
        }
    }
}

fn log_drops(report: &StageReport) {
    for (reason, rows) in &report.dropped {
        info!("Rows dropped due to {}: {}", reason.describe(), rows);
    }
}
