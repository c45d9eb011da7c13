use log::{debug, info, warn};

use crate::{
    classifier::ColorClassifier,
    config::MonitorConfig,
    counters::CounterAggregator,
    ports::{sample_when_ready, Clock, ColorSensor, TelemetryClient},
    recovery::{recover, RecoverySnapshot},
    tracker::{BurnerTracker, Transition},
    types::{BurnerEvent, BurnerState, ColorSample, Counters, UploadOutcome},
    uploader::TelemetryUploader,
};

/// What happened during one polling iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    SensorUnavailable,
    Sampled(Transition),
    Cycle {
        event: BurnerEvent,
        upload: UploadOutcome,
    },
}

/// The whole polling pipeline: classifier, tracker, counters and uploader.
#[derive(Debug, Clone)]
pub struct BurnerMonitor {
    classifier: ColorClassifier,
    tracker: BurnerTracker,
    counters: CounterAggregator,
    uploader: TelemetryUploader,
    sensor_ready_attempts: u32,
    color_trace_interval_ms: u64,
    last_color_trace_ms: Option<u64>,
}

impl BurnerMonitor {
    pub fn new(config: &MonitorConfig, current_day_of_year: Option<u16>) -> Self {
        Self {
            classifier: ColorClassifier::from_config(config),
            tracker: BurnerTracker::from_config(config),
            counters: CounterAggregator::new(current_day_of_year),
            uploader: TelemetryUploader::from_config(config),
            sensor_ready_attempts: config.sensor_ready_attempts,
            color_trace_interval_ms: config.color_trace_interval_ms,
            last_color_trace_ms: None,
        }
    }

    pub fn state(&self) -> BurnerState {
        self.tracker.state()
    }

    pub fn counters(&self) -> Counters {
        self.counters.snapshot()
    }

    pub fn last_cycle(&self) -> Option<BurnerEvent> {
        self.tracker.last_cycle()
    }

    /// Seeds the counters from the telemetry store. Never fails: an
    /// unreachable store leaves the counters at zero.
    pub fn restore<T, C>(&mut self, client: &mut T, clock: &C) -> Option<RecoverySnapshot>
    where
        T: TelemetryClient + ?Sized,
        C: Clock + ?Sized,
    {
        match recover(client, clock) {
            Ok(snapshot) => {
                self.counters.apply_recovery(&snapshot, clock.today());
                let counters = self.counters.snapshot();
                info!(
                    "counters restored: daily={}s cumulative={}s",
                    counters.daily_total_secs, counters.cumulative_total_secs
                );
                Some(snapshot)
            }
            Err(err) => {
                warn!("counter recovery abandoned, starting from zero: {err}");
                None
            }
        }
    }

    pub fn poll<S, T, C>(&mut self, sensor: &mut S, client: &mut T, clock: &C) -> PollOutcome
    where
        S: ColorSensor + ?Sized,
        T: TelemetryClient + ?Sized,
        C: Clock + ?Sized,
    {
        let sample = match sample_when_ready(sensor, self.sensor_ready_attempts) {
            Ok(sample) => sample,
            Err(err) => {
                warn!("skipping tick: {err}");
                return PollOutcome::SensorUnavailable;
            }
        };

        let now_ms = clock.now_ms();
        self.trace_color(sample, now_ms);

        match self.observe(sample, now_ms) {
            Transition::Finished(event) => {
                self.counters.record(event, clock);
                let counters = self.counters.snapshot();
                let upload = self
                    .uploader
                    .maybe_upload(now_ms, &counters, event, client);
                PollOutcome::Cycle { event, upload }
            }
            transition => PollOutcome::Sampled(transition),
        }
    }

    /// Classifies one sample and advances the tracker.
    pub fn observe(&mut self, sample: ColorSample, now_ms: u64) -> Transition {
        let signal = self.classifier.classify(sample);
        let transition = self.tracker.update(signal, now_ms);

        match transition {
            Transition::Started => info!("burner ON"),
            Transition::Finished(event) => {
                info!("burner OFF after {} ms", event.duration_ms)
            }
            Transition::FalsePositive { elapsed_ms } => {
                info!("false positive ({elapsed_ms} ms), preheat flash ignored")
            }
            Transition::None => {}
        }

        transition
    }

    fn trace_color(&mut self, sample: ColorSample, now_ms: u64) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        if let Some(last) = self.last_color_trace_ms {
            if now_ms.saturating_sub(last) < self.color_trace_interval_ms {
                return;
            }
        }
        self.last_color_trace_ms = Some(now_ms);
        debug!(
            "R: {:.2}, G: {:.2}, B: {:.2}",
            sample.red, sample.green, sample.blue
        );
    }
}
