pub mod calendar;
pub mod classifier;
pub mod config;
pub mod counters;
pub mod monitor;
pub mod ports;
pub mod recovery;
pub mod thingspeak;
pub mod tracker;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod fakes;

pub use classifier::ColorClassifier;
pub use config::{MonitorConfig, NetworkConfig, RuntimeConfig, ThingSpeakConfig};
pub use counters::CounterAggregator;
pub use monitor::{BurnerMonitor, PollOutcome};
pub use ports::{Clock, ColorSensor, SensorError, TelemetryClient, TelemetryError};
pub use recovery::{recover, RecoveryError, RecoverySnapshot};
pub use thingspeak::ChannelEntry;
pub use tracker::{BurnerTracker, Transition};
pub use types::{
    BurnerEvent, BurnerState, ColorSample, Counters, Field, TelemetryReport, UploadOutcome,
};
pub use uploader::{TelemetryUploader, UploadThrottle};
