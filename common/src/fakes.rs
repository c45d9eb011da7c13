use std::cell::Cell;

use chrono::{DateTime, FixedOffset, TimeZone};

use crate::{
    ports::{Clock, ColorSensor, SensorError, TelemetryClient, TelemetryError},
    thingspeak::{ChannelEntry, HTTP_OK},
    types::{ColorSample, TelemetryReport},
};

pub struct FakeClock {
    pub now_ms: Cell<u64>,
    pub local: Cell<Option<DateTime<FixedOffset>>>,
}

impl FakeClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Self {
        let local = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .unwrap();
        Self {
            now_ms: Cell::new(0),
            local: Cell::new(Some(local)),
        }
    }

    pub fn unsynced() -> Self {
        Self {
            now_ms: Cell::new(0),
            local: Cell::new(None),
        }
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn next_day(&self) {
        self.local
            .set(self.local.get().map(|now| now + chrono::Duration::days(1)));
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn local_now(&self) -> Option<DateTime<FixedOffset>> {
        self.local.get()
    }
}

pub struct FakeTelemetry {
    pub online: bool,
    pub connect_attempts: u32,
    pub upload_status: u16,
    pub upload_error: Option<String>,
    pub uploads: Vec<TelemetryReport>,
    pub entry: Option<ChannelEntry>,
}

impl Default for FakeTelemetry {
    fn default() -> Self {
        Self {
            online: true,
            connect_attempts: 0,
            upload_status: HTTP_OK,
            upload_error: None,
            uploads: Vec::new(),
            entry: None,
        }
    }
}

impl TelemetryClient for FakeTelemetry {
    fn ensure_connected(&mut self) -> Result<(), TelemetryError> {
        self.connect_attempts += 1;
        if self.online {
            Ok(())
        } else {
            Err(TelemetryError::Offline("wifi down".to_string()))
        }
    }

    fn upload(&mut self, report: &TelemetryReport) -> Result<u16, TelemetryError> {
        if let Some(reason) = &self.upload_error {
            return Err(TelemetryError::Transport(reason.clone()));
        }
        self.uploads.push(*report);
        Ok(self.upload_status)
    }

    fn latest_entry(&mut self) -> Result<ChannelEntry, TelemetryError> {
        self.entry.clone().ok_or(TelemetryError::Status(404))
    }
}

/// Replays a fixed list of readings; `None` means the sensor is not ready.
pub struct ScriptedSensor {
    pub readings: Vec<Option<ColorSample>>,
    pub cursor: usize,
}

impl ScriptedSensor {
    pub fn new(readings: Vec<Option<ColorSample>>) -> Self {
        Self {
            readings,
            cursor: 0,
        }
    }
}

impl ColorSensor for ScriptedSensor {
    fn data_ready(&mut self) -> Result<bool, SensorError> {
        let ready = matches!(self.readings.get(self.cursor), Some(Some(_)));
        if !ready {
            self.cursor += 1;
        }
        Ok(ready)
    }

    fn read_color(&mut self) -> Result<ColorSample, SensorError> {
        let sample = self
            .readings
            .get(self.cursor)
            .copied()
            .flatten()
            .ok_or_else(|| SensorError::Bus("read past script".to_string()))?;
        self.cursor += 1;
        Ok(sample)
    }
}
