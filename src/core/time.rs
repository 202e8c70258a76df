//! Parsing of caller-supplied dates and times.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized date/time: {0:?}")]
pub struct TimeFormatError(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("date must be YYYY-MM-DD: {0:?}")]
pub struct DateFormatError(pub String);

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %I:%M %p",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a date or date-time in one of the usual ISO-like shapes. A
/// bare date means midnight. Offsets in RFC 3339 input are dropped and
/// the wall-clock time kept.
pub fn parse_flexible(input: &str) -> Result<NaiveDateTime, TimeFormatError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format)
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(midnight);
        }
    }
    Err(TimeFormatError(input.to_string()))
}

/// Parse a calendar day written exactly as `YYYY-MM-DD`.
pub fn parse_day(input: &str) -> Result<NaiveDate, DateFormatError> {
    let well_formed = input.len() == 10
        && input.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if !well_formed {
        return Err(DateFormatError(input.to_string()));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| DateFormatError(input.to_string()))
}
