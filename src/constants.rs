/// Column and segment constants shared by the transform stages

// Event columns
pub const USER_ID: &str = "user_id";
pub const TIMESTAMP: &str = "timestamp";

/// Prefix marking free-form metadata columns, excluded from dedup identity
pub const METADATA_PREFIX: &str = "metadata.";

// User columns
pub const COUNTRY: &str = "country";
pub const SIGNUP_DATE: &str = "signup_date";

// Daily summary columns
pub const EVENT_DATE: &str = "event_date";
pub const EVENT_COUNT: &str = "event_count";

/// Only rows whose user country matches this value survive enrichment
pub const SEGMENT_COUNTRY: &str = "US";

/// Suffix appended to user columns whose name collides with an event column
pub const USER_COLUMN_SUFFIX: &str = "_user";

// Table names used in schema errors and logs
pub const EVENTS_TABLE: &str = "events";
pub const USERS_TABLE: &str = "users";
pub const ENRICHED_TABLE: &str = "enriched";
pub const SUMMARY_TABLE: &str = "daily_summary";

/// Returns true when the column belongs to the metadata namespace
pub fn is_metadata_column(name: &str) -> bool {
    name.starts_with(METADATA_PREFIX)
}
