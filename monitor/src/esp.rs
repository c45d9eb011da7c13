use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use burner_common::{
    config::NetworkConfig,
    thingspeak::{encode_update, last_entry_url, update_url, FORM_CONTENT_TYPE},
    BurnerMonitor, ChannelEntry, Clock, RuntimeConfig, TelemetryClient, TelemetryError,
    TelemetryReport, ThingSpeakConfig,
};
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::{Read, Write},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::FreeRtos,
    i2c::{I2cConfig, I2cDriver},
    units::Hertz,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    sntp::{EspSntp, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};
use log::{error, info, warn};

use tcs3472::RgbCGain;

use crate::{clock::SystemClock, tcs34725::LampSensor};

const NVS_NAMESPACE: &str = "burner";
const NVS_RUNTIME_KEY: &str = "runtime_json";

const MAX_HTTP_BODY: usize = 2048;
const WATCHDOG_TIMEOUT_SEC: u32 = 90;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const SNTP_WAIT_MS: u64 = 15_000;
const I2C_BAUDRATE_HZ: u32 = 100_000;

struct NvsStore {
    partition: EspDefaultNvsPartition,
}

/// ThingSpeak over the ESP-IDF HTTP client; owns the WiFi station so it can
/// bring the link back before an upload.
struct EspThingSpeak {
    wifi: BlockingWifi<EspWifi<'static>>,
    config: ThingSpeakConfig,
}

impl EspThingSpeak {
    fn connection(&self) -> Result<HttpClient<EspHttpConnection>, TelemetryError> {
        let conf = HttpClientConfiguration {
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&conf)
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
        Ok(HttpClient::wrap(connection))
    }
}

impl TelemetryClient for EspThingSpeak {
    fn ensure_connected(&mut self) -> Result<(), TelemetryError> {
        if self.wifi.is_connected().unwrap_or(false) {
            return Ok(());
        }

        warn!("wifi link down; reconnecting");
        self.wifi
            .connect()
            .and_then(|()| self.wifi.wait_netif_up())
            .map_err(|err| TelemetryError::Offline(format!("{err:?}")))?;
        info!("wifi reconnected");
        Ok(())
    }

    fn upload(&mut self, report: &TelemetryReport) -> Result<u16, TelemetryError> {
        let body = encode_update(&self.config.write_api_key, report);
        let content_length = body.len().to_string();
        let headers = [
            ("content-type", FORM_CONTENT_TYPE),
            ("content-length", content_length.as_str()),
        ];

        let mut client = self.connection()?;
        let mut request = client
            .request(Method::Post, &update_url(&self.config.base_url), &headers)
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
        request
            .write_all(body.as_bytes())
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
        request
            .flush()
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
        let response = request
            .submit()
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;

        Ok(response.status())
    }

    fn latest_entry(&mut self) -> Result<ChannelEntry, TelemetryError> {
        self.ensure_connected()?;

        let url = last_entry_url(
            &self.config.base_url,
            &self.config.channel_id,
            &self.config.read_api_key,
        );
        let mut client = self.connection()?;
        let request = client
            .request(Method::Get, &url, &[])
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
        let mut response = request
            .submit()
            .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(TelemetryError::Status(status));
        }

        let mut body = Vec::new();
        let mut chunk = [0_u8; 256];
        loop {
            let read = response
                .read(&mut chunk)
                .map_err(|err| TelemetryError::Transport(format!("{err:?}")))?;
            if read == 0 {
                break;
            }
            if body.len() + read > MAX_HTTP_BODY {
                return Err(TelemetryError::Payload("feed response too large".to_string()));
            }
            body.extend_from_slice(&chunk[..read]);
        }

        ChannelEntry::parse(&body)
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs_store = NvsStore {
        partition: nvs_partition.clone(),
    };

    let mut runtime = nvs_store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    ensure_build_defaults(&mut runtime);
    runtime.sanitize();

    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let i2c = I2cDriver::new(
        i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(I2C_BAUDRATE_HZ)),
    )
    .context("failed to initialize I2C bus")?;
    let mut sensor = LampSensor::new(i2c);
    match sensor.init(runtime.monitor.integration_time_ms, RgbCGain::_1x, &mut FreeRtos) {
        Ok(()) => info!("TCS34725 ready"),
        Err(err) => error!("TCS34725 not found: {err}"),
    }

    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;
    disable_wifi_power_save();

    let sntp = EspSntp::new_default().context("failed to start SNTP")?;
    wait_for_time_sync(&sntp);

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let clock = SystemClock::new(&runtime.timezone)?;
    let mut client = EspThingSpeak {
        wifi,
        config: runtime.thingspeak.clone(),
    };

    let mut monitor = BurnerMonitor::new(&runtime.monitor, clock.day_of_year());
    if runtime.thingspeak.can_recover() {
        monitor.restore(&mut client, &clock);
    } else {
        warn!("no ThingSpeak channel configured; counters start from zero");
    }

    info!("burner monitor started (timezone {})", clock.timezone());

    // Keep SNTP alive for the program lifetime.
    let _sntp = sntp;
    let sample_period = Duration::from_millis(u64::from(runtime.monitor.integration_time_ms));

    loop {
        feed_watchdog();
        monitor.poll(&mut sensor, &mut client, &clock);
        thread::sleep(sample_period);
    }
}

fn has_station_credentials(network: &NetworkConfig) -> bool {
    let ssid = network.wifi_ssid.trim();
    !ssid.is_empty() && ssid != "CHANGE_ME"
}

fn ensure_build_defaults(runtime: &mut RuntimeConfig) {
    let defaults = [
        (&mut runtime.network.wifi_ssid, option_env!("WIFI_SSID")),
        (&mut runtime.network.wifi_pass, option_env!("WIFI_PASS")),
        (
            &mut runtime.thingspeak.write_api_key,
            option_env!("THINGSPEAK_WRITE_KEY"),
        ),
        (
            &mut runtime.thingspeak.read_api_key,
            option_env!("THINGSPEAK_READ_KEY"),
        ),
        (
            &mut runtime.thingspeak.channel_id,
            option_env!("THINGSPEAK_CHANNEL_ID"),
        ),
    ];

    for (target, fallback) in defaults {
        if target.is_empty() {
            if let Some(value) = fallback {
                *target = value.to_string();
            }
        }
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    if !has_station_credentials(network) {
        return Err(anyhow!("wifi credentials missing; set WIFI_SSID/WIFI_PASS"));
    }

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                let ip = wifi.wifi().sta_netif().get_ip_info()?;
                info!("wifi connected, IP address {}", ip.ip);
                return Ok(wifi);
            }
            Err(err) => warn!("wifi connect failed on attempt {attempt}: {err:#}"),
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    // Uploads retry the association; counting works offline.
    warn!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed; continuing offline");
    Ok(wifi)
}

fn wait_for_time_sync(sntp: &EspSntp<'static>) {
    let started = Instant::now();
    while sntp.get_sync_status() != SyncStatus::Completed {
        if started.elapsed() >= Duration::from_millis(SNTP_WAIT_MS) {
            warn!("SNTP not synced after {}s; day tracking unknown until it is", SNTP_WAIT_MS / 1000);
            return;
        }
        thread::sleep(Duration::from_millis(250));
    }
    info!("SNTP synced");
}

impl NvsStore {
    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = vec![0_u8; 2048];

        match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
            Some(value) => Ok(serde_json::from_str::<RuntimeConfig>(value)?),
            None => Ok(RuntimeConfig::default()),
        }
    }
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}
