use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use uuid::Uuid;

use event_etl::app::ports::TableSource;
use event_etl::app::EtlUseCase;
use event_etl::config::{
    Config, PathOverrides, ENRICHED_OUTPUT_PATH_ENV, EVENTS_PATH_ENV, SUMMARY_OUTPUT_PATH_ENV,
    USERS_PATH_ENV,
};
use event_etl::infra::ParquetTableSource;
use event_etl::observability::{self, metrics};

#[derive(Parser)]
#[command(name = "event_etl")]
#[command(about = "Batch ETL: clean raw events, join users, write daily summaries")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline once
    Run(RunArgs),
    /// Print the schema and first rows of a Parquet artifact
    Inspect {
        /// Parquet file to read
        path: PathBuf,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML config file (defaults to ./etl.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Raw events JSON file
    #[arg(long, env = EVENTS_PATH_ENV)]
    events_path: Option<PathBuf>,
    /// Users CSV file
    #[arg(long, env = USERS_PATH_ENV)]
    users_path: Option<PathBuf>,
    /// Destination of the enriched events Parquet file
    #[arg(long, env = ENRICHED_OUTPUT_PATH_ENV)]
    enriched_output_path: Option<PathBuf>,
    /// Destination of the daily summary Parquet file
    #[arg(long, env = SUMMARY_OUTPUT_PATH_ENV)]
    summary_output_path: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> PathOverrides {
        PathOverrides {
            events_path: self.events_path.clone(),
            users_path: self.users_path.clone(),
            enriched_output_path: self.enriched_output_path.clone(),
            summary_output_path: self.summary_output_path.clone(),
        }
    }
}

fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = Config::resolve(args.config.as_deref(), &args.overrides())
        .context("Failed to resolve configuration")?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("etl_run", run_id = %run_id);
    let _enter = span.enter();

    let started = Instant::now();
    let outcome = EtlUseCase::from_config(&config).run();
    match &outcome {
        Ok(_) => metrics::run::success(started.elapsed()),
        Err(e) => {
            error!("ETL run failed: {}", e);
            metrics::run::error(started.elapsed());
        }
    }

    if let Err(e) = observability::export_textfile() {
        warn!("Failed to export metrics snapshot: {}", e);
    }

    let summary = outcome.context("ETL run failed")?;
    println!("\n📊 ETL Results:");
    for report in &summary.reports {
        println!(
            "   {}: {} in, {} out, {} dropped",
            report.stage,
            report.rows_in,
            report.rows_out,
            report.total_dropped()
        );
    }
    for path in &summary.outputs {
        println!("   Output file: {}", path.display());
    }
    Ok(())
}

fn inspect(path: PathBuf, limit: usize) -> Result<()> {
    let source = ParquetTableSource::new(&path, "inspect");
    let table = source
        .load()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    info!("Inspected {} ({} rows)", source.describe(), table.len());
    println!("📄 {}", path.display());
    println!("   Rows: {}", table.len());
    println!("   Columns:");
    for column in table.columns() {
        println!("     - {}: {}", column.name, column.column_type);
    }

    println!("   First {} rows:", limit.min(table.len()));
    for row in table.rows().iter().take(limit) {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("     {}", cells.join(" | "));
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load .env before clap reads env-backed flags
    dotenv::dotenv().ok();

    let _log_guard = observability::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            if let Err(e) = metrics::init() {
                warn!("Metrics disabled: {}", e);
            }
            run_pipeline(&args)
        }
        Commands::Inspect { path, limit } => inspect(path, limit),
    }
}
