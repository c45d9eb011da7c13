use chrono::NaiveDate;
use log::{info, warn};
use thiserror::Error;

use crate::{
    calendar::record_local_date,
    ports::{Clock, TelemetryClient, TelemetryError},
    types::Field,
};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("telemetry store unreachable: {0}")]
    Unavailable(#[from] TelemetryError),
}

/// Last totals persisted in the telemetry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverySnapshot {
    pub cumulative_total_secs: u64,
    pub daily_total_secs: u64,
    /// Local date of the record, `None` if it could not be established.
    pub recorded_date: Option<NaiveDate>,
}

/// Reads the newest channel entry. Only a failed query is an error; bad
/// field values read as zero and a bad timestamp leaves the date unknown.
pub fn recover<T, C>(client: &mut T, clock: &C) -> Result<RecoverySnapshot, RecoveryError>
where
    T: TelemetryClient + ?Sized,
    C: Clock + ?Sized,
{
    let entry = client.latest_entry()?;

    let read = |field: Field| match entry.field(field) {
        Ok(value) => value,
        Err(err) => {
            warn!("recovery: {} unusable ({err}); using 0", field.key());
            0
        }
    };
    let cumulative_total_secs = read(Field::CumulativeTotal);
    let daily_total_secs = read(Field::DailyTotal);

    let recorded_date = match (entry.record_timestamp(), clock.local_now()) {
        (Ok(timestamp), Some(now)) => match record_local_date(timestamp, &now) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!("recovery: failed to parse record date: {err}");
                None
            }
        },
        (Err(err), _) => {
            warn!("recovery: {err}");
            None
        }
        (Ok(_), None) => {
            warn!("recovery: local time not synced; daily total cannot be matched");
            None
        }
    };

    info!(
        "recovered cumulative={cumulative_total_secs}s daily={daily_total_secs}s recorded={}",
        recorded_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    Ok(RecoverySnapshot {
        cumulative_total_secs,
        daily_total_secs,
        recorded_date,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        fakes::{FakeClock, FakeTelemetry},
        thingspeak::ChannelEntry,
    };

    fn entry(created_at: &str, daily: &str, cumulative: &str) -> ChannelEntry {
        ChannelEntry {
            created_at: Some(created_at.to_string()),
            entry_id: Some(1),
            field1: Some("61.0".to_string()),
            field2: Some(daily.to_string()),
            field3: Some(cumulative.to_string()),
        }
    }

    #[test]
    fn reads_totals_and_local_record_date() {
        let clock = FakeClock::at(2026, 3, 14, 10);
        let mut client = FakeTelemetry {
            entry: Some(entry("2026-03-14T06:00:00Z", "300", "500")),
            ..FakeTelemetry::default()
        };

        let snapshot = recover(&mut client, &clock).unwrap();

        assert_eq!(
            snapshot,
            RecoverySnapshot {
                cumulative_total_secs: 500,
                daily_total_secs: 300,
                recorded_date: NaiveDate::from_ymd_opt(2026, 3, 14),
            }
        );
        assert_eq!(snapshot.recorded_date.map(|date| date.ordinal0()), Some(72));
    }

    #[test]
    fn malformed_timestamp_leaves_date_unknown() {
        let clock = FakeClock::at(2026, 3, 14, 10);
        let mut client = FakeTelemetry {
            entry: Some(entry("14/03/2026", "300", "500")),
            ..FakeTelemetry::default()
        };

        let snapshot = recover(&mut client, &clock).unwrap();

        assert_eq!(snapshot.cumulative_total_secs, 500);
        assert_eq!(snapshot.recorded_date, None);
    }

    #[test]
    fn unsynced_clock_leaves_date_unknown() {
        let clock = FakeClock::unsynced();
        let mut client = FakeTelemetry {
            entry: Some(entry("2026-03-14T06:00:00Z", "300", "500")),
            ..FakeTelemetry::default()
        };

        let snapshot = recover(&mut client, &clock).unwrap();

        assert_eq!(snapshot.recorded_date, None);
    }

    #[test]
    fn garbage_fields_read_as_zero() {
        let clock = FakeClock::at(2026, 3, 14, 10);
        let mut client = FakeTelemetry {
            entry: Some(entry("2026-03-14T06:00:00Z", "n/a", "-4")),
            ..FakeTelemetry::default()
        };

        let snapshot = recover(&mut client, &clock).unwrap();

        assert_eq!(snapshot.daily_total_secs, 0);
        assert_eq!(snapshot.cumulative_total_secs, 0);
    }

    #[test]
    fn query_failure_is_an_error() {
        let clock = FakeClock::at(2026, 3, 14, 10);
        let mut client = FakeTelemetry {
            entry: None,
            ..FakeTelemetry::default()
        };

        let err = recover(&mut client, &clock).unwrap_err();

        assert!(matches!(
            err,
            RecoveryError::Unavailable(TelemetryError::Status(404))
        ));
    }
}
