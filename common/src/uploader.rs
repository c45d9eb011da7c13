use log::{info, warn};

use crate::{
    config::MonitorConfig,
    ports::{TelemetryClient, TelemetryError},
    thingspeak::HTTP_OK,
    types::{BurnerEvent, Counters, TelemetryReport, UploadOutcome},
};

/// At most one attempt per posting interval; nothing is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadThrottle {
    interval_ms: u64,
    last_upload_ms: Option<u64>,
}

impl UploadThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_upload_ms: None,
        }
    }

    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.last_upload_ms
            .map(|last| now_ms.saturating_sub(last) > self.interval_ms)
            .unwrap_or(true)
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_upload_ms = Some(now_ms);
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryUploader {
    throttle: UploadThrottle,
}

impl TelemetryUploader {
    pub fn new(posting_interval_ms: u64) -> Self {
        Self {
            throttle: UploadThrottle::new(posting_interval_ms),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.posting_interval_ms)
    }

    pub fn maybe_upload<C: TelemetryClient + ?Sized>(
        &mut self,
        now_ms: u64,
        counters: &Counters,
        last_cycle: BurnerEvent,
        client: &mut C,
    ) -> UploadOutcome {
        if !self.throttle.is_ready(now_ms) {
            info!(
                "upload skipped: last attempt less than {}s ago",
                self.throttle.interval_ms / 1000
            );
            return UploadOutcome::Throttled;
        }
        self.throttle.mark(now_ms);

        if let Err(err) = client.ensure_connected() {
            warn!("upload skipped, network unavailable: {err}");
            return UploadOutcome::Offline {
                reason: err.to_string(),
            };
        }

        let report = TelemetryReport::new(last_cycle, counters);
        match client.upload(&report) {
            Ok(HTTP_OK) => {
                info!(
                    "telemetry sent: cycle={:.3}s daily={}s cumulative={}s",
                    report.last_cycle_secs, report.daily_total_secs, report.cumulative_total_secs
                );
                UploadOutcome::Delivered
            }
            Ok(status) | Err(TelemetryError::Status(status)) => {
                warn!("telemetry server error, code: {status}");
                UploadOutcome::Rejected { status }
            }
            Err(err) => {
                warn!("telemetry upload failed: {err}");
                UploadOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
