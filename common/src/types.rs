/// One color reading, each channel normalized against the clear channel to 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorSample {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl ColorSample {
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Scales raw channel counts by the clear channel. A dark sensor reads as black.
    pub fn from_channels(clear: u16, red: u16, green: u16, blue: u16) -> Self {
        if clear == 0 {
            return Self::default();
        }
        let clear = f32::from(clear);
        Self::new(
            f32::from(red) / clear * 255.0,
            f32::from(green) / clear * 255.0,
            f32::from(blue) / clear * 255.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnerState {
    Idle,
    Running,
}

impl BurnerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
        }
    }
}

/// A finished burner cycle that outlasted the minimum-on threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnerEvent {
    pub duration_ms: u64,
}

impl BurnerEvent {
    pub fn duration_secs(self) -> u64 {
        self.duration_ms / 1000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub daily_total_secs: u64,
    pub cumulative_total_secs: u64,
    pub current_day_of_year: Option<u16>,
}

/// Channel field indexes of the metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    LastCycle,
    DailyTotal,
    CumulativeTotal,
}

impl Field {
    pub fn index(self) -> u8 {
        match self {
            Self::LastCycle => 1,
            Self::DailyTotal => 2,
            Self::CumulativeTotal => 3,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::LastCycle => "field1",
            Self::DailyTotal => "field2",
            Self::CumulativeTotal => "field3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReport {
    pub last_cycle_secs: f64,
    pub daily_total_secs: u64,
    pub cumulative_total_secs: u64,
}

impl TelemetryReport {
    pub fn new(last_cycle: BurnerEvent, counters: &Counters) -> Self {
        Self {
            last_cycle_secs: last_cycle.duration_ms as f64 / 1000.0,
            daily_total_secs: counters.daily_total_secs,
            cumulative_total_secs: counters.cumulative_total_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Throttled,
    Delivered,
    Rejected { status: u16 },
    Offline { reason: String },
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_scale_against_clear() {
        let sample = ColorSample::from_channels(1_000, 100, 80, 0);

        assert!((sample.red - 25.5).abs() < 1e-3);
        assert!((sample.green - 20.4).abs() < 1e-3);
        assert_eq!(sample.blue, 0.0);
    }

    #[test]
    fn dark_sensor_reads_as_black() {
        assert_eq!(ColorSample::from_channels(0, 12, 7, 3), ColorSample::default());
    }

    #[test]
    fn report_keeps_millisecond_precision() {
        let counters = Counters {
            daily_total_secs: 40,
            cumulative_total_secs: 510,
            current_day_of_year: Some(19),
        };

        let report = TelemetryReport::new(BurnerEvent { duration_ms: 12_345 }, &counters);

        assert_eq!(report.last_cycle_secs, 12.345);
        assert_eq!(report.daily_total_secs, 40);
        assert_eq!(report.cumulative_total_secs, 510);
    }
}
