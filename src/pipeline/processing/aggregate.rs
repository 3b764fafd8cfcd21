use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::instrument;

use crate::constants::{EVENT_COUNT, EVENT_DATE, SUMMARY_TABLE, TIMESTAMP, USER_ID};
use crate::error::{EtlError, Result};
use crate::pipeline::stage_report::{Stage, StageReport};
use crate::table::{Column, Table};
use crate::types::{ColumnType, Value};

/// Trait for deriving the daily summary from enriched events
pub trait Aggregator {
    fn aggregate(&self, enriched: &Table) -> Result<(Table, StageReport)>;
}

/// Counts enriched events per (UTC calendar date, user).
/// Output rows are sorted by `event_date`, then `user_id`.
#[derive(Debug, Default, Clone)]
pub struct DailyAggregator;

impl DailyAggregator {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for DailyAggregator {
    #[instrument(skip_all, fields(rows = enriched.len()))]
    fn aggregate(&self, enriched: &Table) -> Result<(Table, StageReport)> {
        let ts_idx = enriched.column_index(TIMESTAMP)?;
        let user_idx = enriched.column_index(USER_ID)?;

        let mut groups: BTreeMap<(NaiveDate, Value), i64> = BTreeMap::new();
        for row in enriched.rows() {
            let event_date = row[ts_idx]
                .as_datetime()
                .ok_or_else(|| EtlError::NotADateTime {
                    column: TIMESTAMP.to_string(),
                    value: row[ts_idx].to_string(),
                })?
                .date_naive();
            *groups.entry((event_date, row[user_idx].clone())).or_insert(0) += 1;
        }

        let columns = vec![
            Column::new(EVENT_DATE, ColumnType::Date),
            Column::new(USER_ID, enriched.columns()[user_idx].column_type),
            Column::new(EVENT_COUNT, ColumnType::Int),
        ];
        let rows = groups
            .into_iter()
            .map(|((date, user), count)| vec![Value::Date(date), user, Value::Int(count)])
            .collect();

        let summary = Table::from_parts(SUMMARY_TABLE, columns, rows);
        let report = StageReport::new(Stage::Aggregate, enriched.len()).finish(summary.len());
        Ok((summary, report))
    }
}
