//! Timestamp handling for raster time series.
//!
//! Timestamps are compared at whole-date granularity and serialised in the
//! `%Y-%m-%dT%H:%M:%S` form used by the result dictionary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{AtlasError, AtlasResult};

/// Output format for timestamps in result dictionaries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339 (`2016-01-01T00:00:00Z`), naive datetimes assumed UTC
/// (`2016-01-01T00:00:00`), plain dates (`2016-01-01`) and bare years (`2016`).
pub fn parse_timestamp(s: &str) -> AtlasResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }

    if s.len() == 4 {
        if let Ok(year) = s.parse::<i32>() {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
                return Ok(start_of_day(date));
            }
        }
    }

    Err(AtlasError::InvalidTime(s.to_string()))
}

/// Parse a comma separated list of timestamps, preserving order.
pub fn parse_timestamp_list(s: &str) -> AtlasResult<Vec<DateTime<Utc>>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_timestamp)
        .collect()
}

/// Format a timestamp for the result dictionary.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Whether two timestamps fall on the same calendar date (UTC).
pub fn same_date(a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Midnight UTC on the given date.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// January 1st of the given year, midnight UTC.
pub fn year_start(year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(start_of_day)
}
