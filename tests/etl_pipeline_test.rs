use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use serde_json::json;
use tempfile::tempdir;

use event_etl::app::ports::TableSource;
use event_etl::app::EtlUseCase;
use event_etl::config::Config;
use event_etl::error::EtlError;
use event_etl::infra::ParquetTableSource;
use event_etl::pipeline::processing::{Cleaner, EventCleaner};
use event_etl::pipeline::{DropReason, Stage};
use event_etl::types::{ColumnType, Value};

const USERS_CSV: &str = "user_id,country,signup_date\n1,US,2023-01-01\n2,CA,2023-02-01\n";

fn config_in(dir: &Path) -> Config {
    Config {
        events_path: dir.join("data").join("raw_events.json"),
        users_path: dir.join("data").join("users.csv"),
        enriched_output_path: dir.join("output").join("clean_events.parquet"),
        summary_output_path: dir.join("output").join("daily_summary.parquet"),
    }
}

fn write_inputs(config: &Config, events: serde_json::Value, users_csv: &str) -> Result<()> {
    fs::create_dir_all(config.events_path.parent().unwrap())?;
    fs::write(&config.events_path, serde_json::to_vec(&events)?)?;
    fs::write(&config.users_path, users_csv)?;
    Ok(())
}

#[test]
fn test_small_scenario_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00Z"},
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00Z"},
            {"user_id": null, "timestamp": "2024-01-02T00:00:00Z"},
            {"user_id": 2, "timestamp": "not-a-date"}
        ]),
        USERS_CSV,
    )?;

    let summary = EtlUseCase::from_config(&config).run()?;

    let clean = summary.report(Stage::Clean).unwrap();
    assert_eq!(clean.rows_in, 4);
    assert_eq!(clean.dropped_for(DropReason::MissingUserId), 1);
    assert_eq!(clean.dropped_for(DropReason::InvalidTimestamp), 1);
    assert_eq!(clean.dropped_for(DropReason::Duplicate), 1);
    assert_eq!(clean.rows_out, 1);

    let enriched = ParquetTableSource::new(&config.enriched_output_path, "enriched").load()?;
    assert_eq!(enriched.len(), 1);
    assert_eq!(
        enriched.column_names(),
        vec!["user_id", "timestamp", "country", "signup_date"]
    );
    let row = &enriched.rows()[0];
    assert_eq!(row[0], Value::Int(1));
    assert_eq!(row[1], Value::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()));
    assert_eq!(row[2], Value::from("US"));
    assert_eq!(row[3], Value::DateTime(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()));

    let daily = ParquetTableSource::new(&config.summary_output_path, "daily_summary").load()?;
    assert_eq!(daily.column_names(), vec!["event_date", "user_id", "event_count"]);
    assert_eq!(
        daily.rows(),
        &[vec![
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Value::Int(1),
            Value::Int(1),
        ]]
    );
    Ok(())
}

#[test]
fn test_nanosecond_apart_events_survive_the_parquet_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00.000000001Z"},
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00.000000002Z"}
        ]),
        USERS_CSV,
    )?;

    let summary = EtlUseCase::from_config(&config).run()?;
    assert_eq!(summary.enriched_rows, 2);

    let enriched = ParquetTableSource::new(&config.enriched_output_path, "enriched").load()?;
    let ts = enriched.column_index("timestamp")?;
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    assert_eq!(enriched.rows()[0][ts], Value::DateTime(base + TimeDelta::nanoseconds(1)));
    assert_eq!(enriched.rows()[1][ts], Value::DateTime(base + TimeDelta::nanoseconds(2)));

    // Cleaning the written output again must find nothing to drop
    let (recleaned, report) = EventCleaner::new().clean(enriched)?;
    assert_eq!(report.dropped_for(DropReason::Duplicate), 0);
    assert_eq!(recleaned.len(), 2);
    Ok(())
}

#[test]
fn test_metadata_only_differences_are_duplicates() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00Z", "action": "click", "metadata": {"source": "web"}},
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00Z", "action": "click", "metadata": {"source": "ios"}},
            {"user_id": 1, "timestamp": "2024-01-01T12:00:00Z", "action": "view"},
            {"user_id": 1, "timestamp": "2024-01-02T08:00:00Z", "action": "view"}
        ]),
        USERS_CSV,
    )?;

    let summary = EtlUseCase::from_config(&config).run()?;
    assert_eq!(summary.enriched_rows, 3);

    let enriched = ParquetTableSource::new(&config.enriched_output_path, "enriched").load()?;
    let source = enriched.column_index("metadata.source")?;
    assert_eq!(enriched.rows()[0][source], Value::from("web"));

    let daily = ParquetTableSource::new(&config.summary_output_path, "daily_summary").load()?;
    let counts: Vec<&Value> = daily.rows().iter().map(|r| &r[2]).collect();
    assert_eq!(counts, vec![&Value::Int(2), &Value::Int(1)]);

    let total: i64 = daily
        .rows()
        .iter()
        .map(|r| match r[2] {
            Value::Int(n) => n,
            _ => 0,
        })
        .sum();
    assert_eq!(total as usize, enriched.len());
    Ok(())
}

#[test]
fn test_unparseable_signup_date_is_kept_as_null() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([{"user_id": 1, "timestamp": "2024-01-01T10:00:00Z"}]),
        "user_id,country,signup_date\n1,US,someday\n",
    )?;

    EtlUseCase::from_config(&config).run()?;

    let enriched = ParquetTableSource::new(&config.enriched_output_path, "enriched").load()?;
    assert_eq!(enriched.len(), 1);
    let signup = enriched.column_index("signup_date")?;
    assert_eq!(enriched.columns()[signup].column_type, ColumnType::DateTime);
    assert!(enriched.rows()[0][signup].is_null());
    Ok(())
}

#[test]
fn test_zero_rows_after_cleaning_still_writes_both_files() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([
            {"user_id": null, "timestamp": "2024-01-01T10:00:00Z"},
            {"user_id": 2, "timestamp": "garbage"}
        ]),
        USERS_CSV,
    )?;

    let summary = EtlUseCase::from_config(&config).run()?;
    assert_eq!(summary.enriched_rows, 0);
    assert_eq!(summary.summary_rows, 0);

    let enriched = ParquetTableSource::new(&config.enriched_output_path, "enriched").load()?;
    assert!(enriched.is_empty());
    assert!(enriched.has_column("user_id"));

    let daily = ParquetTableSource::new(&config.summary_output_path, "daily_summary").load()?;
    assert!(daily.is_empty());
    assert_eq!(daily.column_names(), vec!["event_date", "user_id", "event_count"]);
    Ok(())
}

#[test]
fn test_unwritable_summary_leaves_no_enriched_output() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config_in(dir.path());
    write_inputs(
        &config,
        json!([{"user_id": 1, "timestamp": "2024-01-01T10:00:00Z"}]),
        USERS_CSV,
    )?;

    // The summary's parent directory is a regular file
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, b"not a directory")?;
    config.summary_output_path = blocker.join("daily_summary.parquet");

    let result = EtlUseCase::from_config(&config).run();

    assert!(matches!(result, Err(EtlError::Output { .. })));
    assert!(!config.enriched_output_path.exists());
    let leftovers: Vec<_> = fs::read_dir(config.enriched_output_path.parent().unwrap())?
        .collect::<std::io::Result<Vec<_>>>()?;
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_rerun_overwrites_previous_outputs() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(
        &config,
        json!([
            {"user_id": 1, "timestamp": "2024-01-01T10:00:00Z"},
            {"user_id": 1, "timestamp": "2024-01-03T10:00:00Z"}
        ]),
        USERS_CSV,
    )?;
    EtlUseCase::from_config(&config).run()?;

    write_inputs(
        &config,
        json!([{"user_id": 1, "timestamp": "2024-01-05T10:00:00Z"}]),
        USERS_CSV,
    )?;
    EtlUseCase::from_config(&config).run()?;

    let daily = ParquetTableSource::new(&config.summary_output_path, "daily_summary").load()?;
    assert_eq!(daily.len(), 1);
    assert_eq!(daily.rows()[0][0], Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
    Ok(())
}

#[test]
fn test_missing_events_file_is_source_error() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    fs::create_dir_all(config.users_path.parent().unwrap())?;
    fs::write(&config.users_path, USERS_CSV)?;

    let result = EtlUseCase::from_config(&config).run();

    assert!(matches!(result, Err(EtlError::Source { .. })));
    assert!(!config.enriched_output_path.exists());
    assert!(!config.summary_output_path.exists());
    Ok(())
}

#[test]
fn test_events_without_timestamp_column_is_schema_error() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    write_inputs(&config, json!([{"user_id": 1, "action": "click"}]), USERS_CSV)?;

    let result = EtlUseCase::from_config(&config).run();

    match result {
        Err(EtlError::MissingColumn { column, .. }) => assert_eq!(column, "timestamp"),
        other => panic!("expected a missing column error, got {:?}", other.map(|s| s.outputs)),
    }
    Ok(())
}
