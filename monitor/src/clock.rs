use std::time::Instant;

use anyhow::anyhow;
use burner_common::{calendar::is_wall_clock_synced, Clock};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;

/// Monotonic uptime plus SNTP-backed local time in the configured zone.
pub struct SystemClock {
    start: Instant,
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: &str) -> anyhow::Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|err| anyhow!("invalid timezone `{timezone}`: {err}"))?;
        Ok(Self {
            start: Instant::now(),
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    fn local_now(&self) -> Option<DateTime<FixedOffset>> {
        let utc = Utc::now();
        if !is_wall_clock_synced(utc) {
            return None;
        }
        let local = utc.with_timezone(&self.timezone);
        Some(local.with_timezone(&local.offset().fix()))
    }
}
