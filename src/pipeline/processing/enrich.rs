use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::constants::{COUNTRY, ENRICHED_TABLE, SEGMENT_COUNTRY, SIGNUP_DATE, USER_COLUMN_SUFFIX, USER_ID};
use crate::error::{EtlError, Result};
use crate::pipeline::processing::timestamps::parse_datetime;
use crate::pipeline::stage_report::{DropReason, Stage, StageReport};
use crate::table::{Column, Row, Table};
use crate::types::{ColumnType, Value};

/// Trait for joining cleaned events to user attributes
pub trait Enricher {
    fn enrich(&self, events: Table, users: Table) -> Result<(Table, StageReport)>;
}

/// Inner-joins events to users on `user_id` and keeps one country segment
#[derive(Debug, Clone)]
pub struct SegmentEnricher {
    /// Exact `country` value a row must carry to survive
    pub segment_country: String,
}

impl Default for SegmentEnricher {
    fn default() -> Self {
        Self {
            segment_country: SEGMENT_COUNTRY.to_string(),
        }
    }
}

impl SegmentEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output columns: every event column, then every user column except the
    /// join key. User names already taken get the `_user` suffix. Returns the
    /// columns and, for each user column, its position in the output.
    fn joined_columns(events: &Table, users: &Table, user_key: usize) -> (Vec<Column>, Vec<Option<usize>>) {
        let mut columns: Vec<Column> = events.columns().to_vec();
        let mut taken: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();
        let mut placement = Vec::with_capacity(users.columns().len());

        for (j, column) in users.columns().iter().enumerate() {
            if j == user_key {
                placement.push(None);
                continue;
            }
            let mut name = column.name.clone();
            while taken.contains(&name) {
                name.push_str(USER_COLUMN_SUFFIX);
            }
            taken.insert(name.clone());
            placement.push(Some(columns.len()));
            columns.push(Column::new(name, column.column_type));
        }

        (columns, placement)
    }
}

impl Enricher for SegmentEnricher {
    #[instrument(skip_all, fields(events = events.len(), users = users.len()))]
    fn enrich(&self, events: Table, users: Table) -> Result<(Table, StageReport)> {
        let event_key = events.column_index(USER_ID)?;
        let user_key = users.column_index(USER_ID)?;
        let user_country = users.column_index(COUNTRY)?;
        let user_signup = users.column_index(SIGNUP_DATE)?;
        let report = StageReport::new(Stage::Enrich, events.len());

        let (columns, placement) = Self::joined_columns(&events, &users, user_key);
        let country_idx = placement[user_country]
            .ok_or_else(|| EtlError::missing_column(ENRICHED_TABLE, COUNTRY))?;
        let signup_idx = placement[user_signup]
            .ok_or_else(|| EtlError::missing_column(ENRICHED_TABLE, SIGNUP_DATE))?;

        let (_, user_rows) = users.into_parts();
        let mut by_key: HashMap<Value, Vec<usize>> = HashMap::with_capacity(user_rows.len());
        for (i, row) in user_rows.iter().enumerate() {
            let key = row[user_key].join_key();
            if !key.is_null() {
                by_key.entry(key).or_default().push(i);
            }
        }

        let (_, event_rows) = events.into_parts();
        let mut joined: Vec<Row> = Vec::with_capacity(event_rows.len());
        for event_row in event_rows {
            let Some(matches) = by_key.get(&event_row[event_key].join_key()) else {
                continue;
            };
            for &u in matches {
                let mut row = event_row.clone();
                row.extend(
                    user_rows[u]
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != user_key)
                        .map(|(_, v)| v.clone()),
                );
                joined.push(row);
            }
        }
        debug!("Inner join produced {} rows", joined.len());

        let mut enriched = Table::from_parts(ENRICHED_TABLE, columns, joined);

        let segment = Value::Str(self.segment_country.clone());
        let outside_segment = enriched.retain_rows(|row| row[country_idx] == segment);
        debug!("Segment filter '{}' removed {} rows", self.segment_country, outside_segment);

        // Unparseable signup dates become null; rows are kept
        enriched.map_column(signup_idx, |v| {
            parse_datetime(v).map(Value::DateTime).unwrap_or(Value::Null)
        });
        enriched.set_column_type(signup_idx, ColumnType::DateTime);

        let report = report
            .with_dropped(DropReason::OutsideSegment, outside_segment)
            .finish(enriched.len());

        Ok((enriched, report))
    }
}
