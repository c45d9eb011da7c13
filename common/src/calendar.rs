use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

/// Wall-clock readings before 2020-01-01 mean SNTP has not completed yet.
pub const EPOCH_2020: i64 = 1_577_836_800;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("record timestamp is empty")]
    Empty,
    #[error("record timestamp `{0}` is not RFC 3339")]
    Invalid(String),
}

pub fn is_wall_clock_synced(utc: DateTime<Utc>) -> bool {
    utc.timestamp() >= EPOCH_2020
}

/// Parses a channel `created_at` value and returns its date in the offset of `local_now`.
pub fn record_local_date(
    timestamp: &str,
    local_now: &DateTime<FixedOffset>,
) -> Result<NaiveDate, TimestampError> {
    let trimmed = timestamp.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::Empty);
    }

    let recorded = DateTime::parse_from_rfc3339(trimmed)
        .map_err(|_| TimestampError::Invalid(trimmed.to_string()))?;
    Ok(recorded.with_timezone(local_now.offset()).date_naive())
}
