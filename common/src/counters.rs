use chrono::{Datelike, NaiveDate};

use crate::{
    ports::Clock,
    recovery::RecoverySnapshot,
    types::{BurnerEvent, Counters},
};

/// Daily and all-time running totals, in whole seconds.
#[derive(Debug, Clone, Default)]
pub struct CounterAggregator {
    counters: Counters,
}

impl CounterAggregator {
    pub fn new(current_day_of_year: Option<u16>) -> Self {
        Self {
            counters: Counters {
                current_day_of_year,
                ..Counters::default()
            },
        }
    }

    pub fn snapshot(&self) -> Counters {
        self.counters
    }

    pub fn daily_total_secs(&self) -> u64 {
        self.counters.daily_total_secs
    }

    pub fn cumulative_total_secs(&self) -> u64 {
        self.counters.cumulative_total_secs
    }

    /// Day of year as reported by the time source, `None` while unsynced.
    pub fn current_day_of_year<C: Clock + ?Sized>(&self, clock: &C) -> Option<u16> {
        clock.day_of_year()
    }

    pub fn record<C: Clock + ?Sized>(&mut self, event: BurnerEvent, clock: &C) {
        let day = self.current_day_of_year(clock);
        self.on_burner_event(event, day);
    }

    pub fn on_burner_event(&mut self, event: BurnerEvent, day_of_year: Option<u16>) {
        let duration_secs = event.duration_secs();
        self.counters.cumulative_total_secs = self
            .counters
            .cumulative_total_secs
            .saturating_add(duration_secs);

        match (self.counters.current_day_of_year, day_of_year) {
            (Some(stored), Some(today)) if stored != today => {
                self.counters.daily_total_secs = duration_secs;
                self.counters.current_day_of_year = Some(today);
            }
            (None, Some(today)) => {
                self.counters.current_day_of_year = Some(today);
                self.counters.daily_total_secs =
                    self.counters.daily_total_secs.saturating_add(duration_secs);
            }
            _ => {
                self.counters.daily_total_secs =
                    self.counters.daily_total_secs.saturating_add(duration_secs);
            }
        }
    }

    /// Reseeds from the telemetry store. The recovered cumulative replaces the
    /// in-memory one; the daily total only carries over from the same date and
    /// never exceeds the cumulative total.
    pub fn apply_recovery(&mut self, snapshot: &RecoverySnapshot, today: Option<NaiveDate>) {
        if snapshot.cumulative_total_secs > 0 {
            self.counters.cumulative_total_secs = snapshot.cumulative_total_secs;
        }

        if let Some(today) = today {
            self.counters.current_day_of_year = Some(today.ordinal0() as u16);
        }

        self.counters.daily_total_secs = match (snapshot.recorded_date, today) {
            (Some(recorded), Some(today)) if recorded == today => snapshot
                .daily_total_secs
                .min(self.counters.cumulative_total_secs),
            _ => 0,
        };
    }
}
