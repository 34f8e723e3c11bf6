//! Conversions between [`Timestamp`] and the textual forms stores persist.

use chrono::{DateTime, NaiveDateTime, Utc};
use gradesync_types::Timestamp;

use crate::StoreError;

/// Text layout written by delimited storage (UTC, nanosecond precision).
const TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Layouts accepted on read: any fractional precision, then whole seconds.
const TEXT_PARSE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Converts a timestamp to a UTC datetime.
pub(crate) fn to_datetime(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.as_secs() as i64, ts.subsec_nanos()).unwrap_or_default()
}

/// Converts a UTC datetime to a timestamp. Pre-epoch instants are rejected.
pub(crate) fn from_datetime(dt: DateTime<Utc>) -> Result<Timestamp, StoreError> {
    dt.timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .map(Timestamp::from_nanos)
        .ok_or_else(|| StoreError::Timestamp {
            value: dt.to_rfc3339(),
        })
}

/// Formats `ts` as `YYYY-MM-DD HH:MM:SS.fffffffff`.
pub fn format_text_timestamp(ts: Timestamp) -> String {
    to_datetime(ts).format(TEXT_FORMAT).to_string()
}

/// Parses `YYYY-MM-DD HH:MM:SS[.fraction]` as a UTC instant.
///
/// Millisecond-precision values written by older tools parse the same as
/// full-precision ones.
pub fn parse_text_timestamp(value: &str) -> Result<Timestamp, StoreError> {
    let value = value.trim();
    TEXT_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| StoreError::Timestamp {
            value: value.to_string(),
        })
        .and_then(|naive| from_datetime(naive.and_utc()))
}
