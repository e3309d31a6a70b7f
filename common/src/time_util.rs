use chrono::{NaiveDateTime, TimeZone, Utc};

/// `2024-01-02T03:04:05Z`
pub const ISO_8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// `2024-01-02 03:04:05`
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Millis since the Unix epoch for either accepted timestamp form,
/// `None` when the value matches neither.
pub fn parse_timestamp_millis(value: &str) -> Option<i64> {
    let parsed = NaiveDateTime::parse_from_str(value, ISO_8601_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, SQL_DATETIME_FORMAT))
        .ok()?;
    Some(Utc.from_utc_datetime(&parsed).timestamp_millis())
}

/// ISO-8601 `Z` rendering of epoch millis.
pub fn format_timestamp_millis(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format(ISO_8601_FORMAT).to_string())
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
