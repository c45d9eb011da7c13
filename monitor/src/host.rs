use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use burner_common::{
    thingspeak::{encode_update, last_entry_url, update_url, FORM_CONTENT_TYPE},
    BurnerMonitor, ChannelEntry, Clock, ColorSample, ColorSensor, RuntimeConfig, SensorError,
    TelemetryClient, TelemetryError, TelemetryReport, ThingSpeakConfig,
};
use reqwest::{blocking::Client, header::CONTENT_TYPE};
use tracing::{info, warn};

use crate::clock::SystemClock;

const POLL_INTERVAL_MS: u64 = 50;

/// Plays back a burner schedule: a preheat flash, a long burn, then idle.
struct SimulatedSensor {
    clock: Arc<SystemClock>,
    period_ms: u64,
    preheat_ms: u64,
    burn_ms: u64,
}

impl SimulatedSensor {
    fn from_env(clock: Arc<SystemClock>) -> Self {
        Self::new(
            clock,
            env_u64("SIM_PERIOD_SECS").unwrap_or(120),
            env_u64("SIM_BURN_SECS").unwrap_or(45),
        )
    }

    fn new(clock: Arc<SystemClock>, period_secs: u64, burn_secs: u64) -> Self {
        let period_ms = period_secs.saturating_mul(1000);
        let burn_ms = burn_secs.saturating_mul(1000);
        Self {
            clock,
            period_ms: period_ms.max(10_000),
            preheat_ms: 3_000,
            burn_ms: burn_ms.min(period_ms.saturating_sub(8_000)),
        }
    }

    fn phase_ms(&self) -> u64 {
        self.clock.now_ms() % self.period_ms
    }
}

impl ColorSensor for SimulatedSensor {
    fn data_ready(&mut self) -> Result<bool, SensorError> {
        Ok(true)
    }

    fn read_color(&mut self) -> Result<ColorSample, SensorError> {
        let phase = self.phase_ms();
        let flash_off = self.preheat_ms + 1_000;
        let lit = phase < self.preheat_ms
            || (flash_off..flash_off + self.burn_ms).contains(&phase);

        Ok(if lit {
            ColorSample::new(96.0, 92.0, 0.4)
        } else {
            ColorSample::new(88.0, 84.0, 79.0)
        })
    }
}

struct HttpThingSpeak {
    http: Client,
    config: ThingSpeakConfig,
}

impl HttpThingSpeak {
    fn new(config: ThingSpeakConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, config })
    }
}

impl TelemetryClient for HttpThingSpeak {
    fn ensure_connected(&mut self) -> Result<(), TelemetryError> {
        // The host network stack reconnects on its own.
        Ok(())
    }

    fn upload(&mut self, report: &TelemetryReport) -> Result<u16, TelemetryError> {
        let response = self
            .http
            .post(update_url(&self.config.base_url))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(encode_update(&self.config.write_api_key, report))
            .send()
            .map_err(|err| TelemetryError::Transport(err.to_string()))?;
        Ok(response.status().as_u16())
    }

    fn latest_entry(&mut self) -> Result<ChannelEntry, TelemetryError> {
        let url = last_entry_url(
            &self.config.base_url,
            &self.config.channel_id,
            &self.config.read_api_key,
        );
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| TelemetryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .map_err(|err| TelemetryError::Transport(err.to_string()))?;
        ChannelEntry::parse(&body)
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let clock = Arc::new(SystemClock::new(&runtime.timezone)?);
    let mut sensor = SimulatedSensor::from_env(clock.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = stop.clone();

    info!(
        "burner monitor (host simulation) starting, timezone {}",
        clock.timezone()
    );

    // reqwest's blocking client may not be built or dropped on an async worker.
    let mut worker = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut client = HttpThingSpeak::new(runtime.thingspeak.clone())?;
        let mut monitor = BurnerMonitor::new(&runtime.monitor, clock.day_of_year());
        if runtime.thingspeak.can_recover() {
            monitor.restore(&mut client, clock.as_ref());
        } else {
            warn!("no ThingSpeak channel configured; counters start from zero");
        }

        while !loop_stop.load(Ordering::Relaxed) {
            monitor.poll(&mut sensor, &mut client, clock.as_ref());
            std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        }

        Ok((monitor.state(), monitor.counters()))
    });

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            None
        }
        joined = &mut worker => Some(joined),
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            stop.store(true, Ordering::Relaxed);
            worker.await
        }
    };

    let (state, counters) = joined.context("monitor loop panicked")??;
    info!(
        "stopped while {}: daily={}s cumulative={}s",
        state.as_str(),
        counters.daily_total_secs,
        counters.cumulative_total_secs
    );
    Ok(())
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let data_dir = std::env::var("BURNER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.burner"));
    let path = data_dir.join("runtime.json");

    match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid config in {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    let overrides = [
        ("THINGSPEAK_URL", &mut runtime.thingspeak.base_url),
        ("THINGSPEAK_WRITE_KEY", &mut runtime.thingspeak.write_api_key),
        ("THINGSPEAK_READ_KEY", &mut runtime.thingspeak.read_api_key),
        ("THINGSPEAK_CHANNEL_ID", &mut runtime.thingspeak.channel_id),
        ("BURNER_TZ", &mut runtime.timezone),
    ];
    for (key, target) in overrides {
        if let Ok(value) = std::env::var(key) {
            *target = value;
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
