use std::fmt;

/// Transform stages that report row-count deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clean,
    Enrich,
    Aggregate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Enrich => "enrich",
            Stage::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a stage removed rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// `user_id` was null or absent
    MissingUserId,
    /// `timestamp` could not be parsed
    InvalidTimestamp,
    /// Identical to an earlier row on every identity column
    Duplicate,
    /// User country outside the target segment
    OutsideSegment,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingUserId => "missing_user_id",
            DropReason::InvalidTimestamp => "invalid_timestamp",
            DropReason::Duplicate => "duplicate",
            DropReason::OutsideSegment => "outside_segment",
        }
    }

    /// Human wording for progress logs
    pub fn describe(&self) -> &'static str {
        match self {
            DropReason::MissingUserId => "bad users",
            DropReason::InvalidTimestamp => "invalid timestamps",
            DropReason::Duplicate => "duplicates",
            DropReason::OutsideSegment => "segment filter",
        }
    }
}

/// Row-count record produced by one stage. Observational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Drop counts in the order the stage applied its rules
    pub dropped: Vec<(DropReason, usize)>,
}

impl StageReport {
    pub fn new(stage: Stage, rows_in: usize) -> Self {
        Self {
            stage,
            rows_in,
            rows_out: rows_in,
            dropped: Vec::new(),
        }
    }

    pub fn with_dropped(mut self, reason: DropReason, rows: usize) -> Self {
        self.dropped.push((reason, rows));
        self
    }

    pub fn finish(mut self, rows_out: usize) -> Self {
        self.rows_out = rows_out;
        self
    }

    /// Rows removed for one reason, zero if the stage never applied it
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped
            .iter()
            .filter(|(r, _)| *r == reason)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.iter().map(|(_, n)| n).sum()
    }
}
