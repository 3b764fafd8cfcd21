use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::constants::{TIMESTAMP, USER_ID};
use crate::error::Result;
use crate::pipeline::processing::timestamps::parse_datetime;
use crate::pipeline::stage_report::{DropReason, Stage, StageReport};
use crate::table::Table;
use crate::types::{ColumnType, Value};

/// Trait for removing structurally invalid and duplicate event rows
pub trait Cleaner {
    fn clean(&self, events: Table) -> Result<(Table, StageReport)>;
}

/// Applies the event cleaning rules in a fixed order:
/// 1. drop rows without a `user_id`
/// 2. parse `timestamp`, dropping rows that fail
/// 3. keep the first of every group of rows equal on all non-metadata columns
#[derive(Debug, Default, Clone)]
pub struct EventCleaner;

impl EventCleaner {
    pub fn new() -> Self {
        Self
    }
}

impl Cleaner for EventCleaner {
    #[instrument(skip_all, fields(rows = events.len()))]
    fn clean(&self, mut events: Table) -> Result<(Table, StageReport)> {
        let user_idx = events.column_index(USER_ID)?;
        let ts_idx = events.column_index(TIMESTAMP)?;
        let report = StageReport::new(Stage::Clean, events.len());

        let missing_user = events.retain_rows(|row| !row[user_idx].is_null());
        debug!("Dropped {} rows without user_id", missing_user);

        events.map_column(ts_idx, |v| {
            parse_datetime(v).map(Value::DateTime).unwrap_or(Value::Null)
        });
        events.set_column_type(ts_idx, ColumnType::DateTime);
        let invalid_timestamps = events.retain_rows(|row| !row[ts_idx].is_null());
        debug!("Dropped {} rows with unparseable timestamps", invalid_timestamps);

        let classes = events.classify_columns();
        debug!(
            "Deduplicating on {} identity columns ({} metadata columns ignored)",
            classes.identity.len(),
            classes.metadata.len()
        );
        let mut seen = HashSet::with_capacity(events.len());
        let duplicates = events.retain_rows(|row| seen.insert(classes.identity_key(row)));

        let report = report
            .with_dropped(DropReason::MissingUserId, missing_user)
            .with_dropped(DropReason::InvalidTimestamp, invalid_timestamps)
            .with_dropped(DropReason::Duplicate, duplicates)
            .finish(events.len());

        Ok((events, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::table::Row;
    use chrono::{TimeZone, Utc};

    fn events(columns: &[&str], rows: Vec<Row>) -> Table {
        let names = columns.iter().map(|c| c.to_string()).collect();
        Table::from_rows("events", names, rows).unwrap()
    }

    fn scenario_events() -> Table {
        events(
            &["user_id", "timestamp"],
            vec![
                vec![Value::Int(1), Value::from("2024-01-01T10:00:00Z")],
                vec![Value::Int(1), Value::from("2024-01-01T10:00:00Z")],
                vec![Value::Null, Value::from("2024-01-02T00:00:00Z")],
                vec![Value::Int(2), Value::from("not-a-date")],
            ],
        )
    }

    #[test]
    fn test_clean_scenario_counts() {
        let (cleaned, report) = EventCleaner::new().clean(scenario_events()).unwrap();

        assert_eq!(report.rows_in, 4);
        assert_eq!(report.dropped_for(DropReason::MissingUserId), 1);
        assert_eq!(report.dropped_for(DropReason::InvalidTimestamp), 1);
        assert_eq!(report.dropped_for(DropReason::Duplicate), 1);
        assert_eq!(report.rows_out, 1);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.rows()[0][0], Value::Int(1));
        assert_eq!(
            cleaned.rows()[0][1],
            Value::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(cleaned.columns()[1].column_type, ColumnType::DateTime);
    }

    #[test]
    fn test_dedup_ignores_metadata_and_keeps_first() {
        let table = events(
            &["user_id", "timestamp", "action", "metadata.source"],
            vec![
                vec![Value::Int(1), Value::from("2024-01-01"), Value::from("click"), Value::from("ios")],
                vec![Value::Int(1), Value::from("2024-01-01"), Value::from("click"), Value::from("web")],
                vec![Value::Int(1), Value::from("2024-01-01"), Value::from("view"), Value::from("web")],
            ],
        );

        let (cleaned, report) = EventCleaner::new().clean(table).unwrap();

        assert_eq!(report.dropped_for(DropReason::Duplicate), 1);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.rows()[0][3], Value::from("ios"));
        assert_eq!(cleaned.rows()[1][2], Value::from("view"));
    }

    #[test]
    fn test_equivalent_timestamps_deduplicate_after_normalization() {
        let table = events(
            &["user_id", "timestamp"],
            vec![
                vec![Value::Int(5), Value::from("2024-01-01T10:00:00Z")],
                vec![Value::Int(5), Value::from("2024-01-01T05:00:00-05:00")],
            ],
        );

        let (cleaned, report) = EventCleaner::new().clean(table).unwrap();
        assert_eq!(report.dropped_for(DropReason::Duplicate), 1);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let cleaner = EventCleaner::new();
        let (once, _) = cleaner.clean(scenario_events()).unwrap();
        let (twice, report) = cleaner.clean(once.clone()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(report.total_dropped(), 0);
    }

    #[test]
    fn test_output_invariants_hold() {
        let (cleaned, _) = EventCleaner::new().clean(scenario_events()).unwrap();
        let user_idx = cleaned.column_index("user_id").unwrap();
        let ts_idx = cleaned.column_index("timestamp").unwrap();

        for row in cleaned.rows() {
            assert!(!row[user_idx].is_null());
            assert!(row[ts_idx].as_datetime().is_some());
        }
        let classes = cleaned.classify_columns();
        let keys: HashSet<_> = cleaned.rows().iter().map(|r| classes.identity_key(r)).collect();
        assert_eq!(keys.len(), cleaned.len());
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let table = events(&["user_id"], vec![vec![Value::Int(1)]]);
        let err = EventCleaner::new().clean(table).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { ref column, .. } if column == "timestamp"));
    }

    #[test]
    fn test_all_rows_invalid_yields_empty_table() {
        let table = events(
            &["user_id", "timestamp"],
            vec![vec![Value::Null, Value::from("2024-01-01")], vec![Value::Int(3), Value::from("nope")]],
        );
        let (cleaned, report) = EventCleaner::new().clean(table).unwrap();
        assert!(cleaned.is_empty());
        assert_eq!(report.rows_out, 0);
        assert_eq!(cleaned.column_names(), vec!["user_id", "timestamp"]);
    }
}
