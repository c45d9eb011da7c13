use serde::{Deserialize, Serialize};

pub const DEFAULT_THINGSPEAK_URL: &str = "https://api.thingspeak.com";
pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub rg_threshold: f32,
    pub b_threshold: f32,
    pub min_on_ms: u64,
    pub posting_interval_ms: u64,
    pub color_trace_interval_ms: u64,
    pub sensor_ready_attempts: u32,
    pub integration_time_ms: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rg_threshold: 10.0,
            b_threshold: 1.0,
            min_on_ms: 5_000,
            posting_interval_ms: 30_000,
            color_trace_interval_ms: 2_000,
            sensor_ready_attempts: 200,
            integration_time_ms: 50,
        }
    }
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        if !self.rg_threshold.is_finite() || self.rg_threshold < 0.0 {
            self.rg_threshold = 10.0;
        }
        if !self.b_threshold.is_finite() || self.b_threshold < 0.0 {
            self.b_threshold = 1.0;
        }
        // ThingSpeak free channels reject updates faster than 15s.
        self.posting_interval_ms = self.posting_interval_ms.max(15_000);
        self.sensor_ready_attempts = self.sensor_ready_attempts.max(1);
        self.integration_time_ms = self.integration_time_ms.clamp(3, 614);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingSpeakConfig {
    pub base_url: String,
    pub write_api_key: String,
    pub read_api_key: String,
    pub channel_id: String,
    pub timeout_ms: u64,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_THINGSPEAK_URL.to_string(),
            write_api_key: String::new(),
            read_api_key: String::new(),
            channel_id: String::new(),
            timeout_ms: 10_000,
        }
    }
}

impl ThingSpeakConfig {
    pub fn sanitize(&mut self) {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            DEFAULT_THINGSPEAK_URL.to_string()
        } else {
            trimmed.to_string()
        };
        self.timeout_ms = self.timeout_ms.clamp(1_000, 60_000);
    }

    pub fn can_recover(&self) -> bool {
        !self.channel_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub thingspeak: ThingSpeakConfig,
    pub timezone: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            network: NetworkConfig::default(),
            thingspeak: ThingSpeakConfig::default(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.monitor.sanitize();
        self.thingspeak.sanitize();
        if self.timezone.trim().is_empty() {
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }
    }
}
