//! Boundaries between the monitor logic and the platform.
//!
//! The host simulation and the ESP32 firmware each implement these traits;
//! everything in this crate is written against them so it can be tested
//! without hardware or network.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use thiserror::Error;

use crate::{
    thingspeak::ChannelEntry,
    types::{ColorSample, TelemetryReport},
};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("color sensor did not report data-ready after {attempts} polls")]
    NotReady { attempts: u32 },
    #[error("color sensor bus error: {0}")]
    Bus(String),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("network unavailable: {0}")]
    Offline(String),
    #[error("telemetry transport error: {0}")]
    Transport(String),
    #[error("telemetry endpoint answered HTTP {0}")]
    Status(u16),
    #[error("malformed telemetry payload: {0}")]
    Payload(String),
    #[error("channel field {0} is missing")]
    MissingField(u8),
}

/// Time source: a monotonic tick plus a synced wall clock in local time.
pub trait Clock {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Local wall clock, `None` until network time has been obtained.
    fn local_now(&self) -> Option<DateTime<FixedOffset>>;

    fn today(&self) -> Option<NaiveDate> {
        self.local_now().map(|now| now.date_naive())
    }

    /// Zero-based day of year in `0..=365`.
    fn day_of_year(&self) -> Option<u16> {
        self.local_now().map(|now| now.ordinal0() as u16)
    }
}

pub trait ColorSensor {
    fn data_ready(&mut self) -> Result<bool, SensorError>;

    fn read_color(&mut self) -> Result<ColorSample, SensorError>;
}

pub trait TelemetryClient {
    /// Brings the link up if it dropped. Called before every upload.
    fn ensure_connected(&mut self) -> Result<(), TelemetryError>;

    /// Sends one report and returns the HTTP status code.
    fn upload(&mut self, report: &TelemetryReport) -> Result<u16, TelemetryError>;

    /// Fetches the most recent entry stored in the channel.
    fn latest_entry(&mut self) -> Result<ChannelEntry, TelemetryError>;
}

/// Blocks until the sensor has a fresh integration cycle, yielding between polls.
pub fn sample_when_ready<S: ColorSensor + ?Sized>(
    sensor: &mut S,
    max_attempts: u32,
) -> Result<ColorSample, SensorError> {
    let attempts = max_attempts.max(1);
    for _ in 0..attempts {
        if sensor.data_ready()? {
            return sensor.read_color();
        }
        std::thread::yield_now();
    }
    Err(SensorError::NotReady { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowSensor {
        ready_after: u32,
        polls: u32,
    }

    impl ColorSensor for SlowSensor {
        fn data_ready(&mut self) -> Result<bool, SensorError> {
            self.polls += 1;
            Ok(self.polls > self.ready_after)
        }

        fn read_color(&mut self) -> Result<ColorSample, SensorError> {
            Ok(ColorSample::new(20.0, 15.0, 0.0))
        }
    }

    #[test]
    fn waits_until_sensor_is_ready() {
        let mut sensor = SlowSensor {
            ready_after: 3,
            polls: 0,
        };

        let sample = sample_when_ready(&mut sensor, 10).unwrap();

        assert_eq!(sample, ColorSample::new(20.0, 15.0, 0.0));
        assert_eq!(sensor.polls, 4);
    }

    #[test]
    fn gives_up_after_attempt_budget() {
        let mut sensor = SlowSensor {
            ready_after: u32::MAX,
            polls: 0,
        };

        let err = sample_when_ready(&mut sensor, 5).unwrap_err();

        assert!(matches!(err, SensorError::NotReady { attempts: 5 }));
        assert_eq!(sensor.polls, 5);
    }
}
