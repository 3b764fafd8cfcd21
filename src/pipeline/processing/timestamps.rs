//! Tolerant date-time parsing shared by the cleaner and the enricher.
//!
//! Every successfully parsed value is normalized to UTC. Naive inputs are
//! taken as UTC, date-only inputs become midnight, and numbers are Unix
//! epoch seconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::Value;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a cell into a UTC date-time, `None` when it is not a recognizable instant
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => Some(midnight(*d)),
        Value::Str(s) => parse_datetime_str(s),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0),
        Value::Float(f) if f.is_finite() => {
            let secs = f.floor();
            let nanos = ((f - secs) * 1e9).round() as u32;
            DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

pub fn parse_datetime_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(midnight(date));
        }
    }
    None
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc3339_with_zulu_and_offset() {
        assert_eq!(
            parse_datetime_str("2024-01-01T10:00:00Z"),
            Some(utc(2024, 1, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime_str("2024-01-01T10:00:00-05:00"),
            Some(utc(2024, 1, 1, 15, 0, 0))
        );
    }

    #[test]
    fn test_naive_inputs_are_utc() {
        assert_eq!(
            parse_datetime_str("2024-03-05 08:30:00"),
            Some(utc(2024, 3, 5, 8, 30, 0))
        );
        assert_eq!(
            parse_datetime_str(" 2024-03-05T08:30 "),
            Some(utc(2024, 3, 5, 8, 30, 0))
        );
    }

    #[test]
    fn test_date_only_is_midnight() {
        assert_eq!(parse_datetime_str("2023-01-01"), Some(utc(2023, 1, 1, 0, 0, 0)));
        assert_eq!(parse_datetime_str("02/01/2023"), Some(utc(2023, 2, 1, 0, 0, 0)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(parse_datetime_str("not-a-date"), None);
        assert_eq!(parse_datetime_str(""), None);
        assert_eq!(parse_datetime_str("2024-13-45"), None);
        assert_eq!(parse_datetime(&Value::Bool(true)), None);
        assert_eq!(parse_datetime(&Value::Null), None);
    }

    #[test]
    fn test_epoch_seconds_and_passthrough() {
        assert_eq!(parse_datetime(&Value::Int(0)), Some(utc(1970, 1, 1, 0, 0, 0)));
        let dt = utc(2024, 1, 1, 10, 0, 0);
        assert_eq!(parse_datetime(&Value::DateTime(dt)), Some(dt));
    }
}
