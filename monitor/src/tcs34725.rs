//! Burner lamp sensor: a TCS34725 driven through the `tcs3472` crate.

use burner_common::{ColorSample, ColorSensor, SensorError};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use tcs3472::{RgbCGain, Tcs3472};

/// TCS34725 and TCS34727 part numbers.
const KNOWN_IDS: [u8; 2] = [0x44, 0x4D];
const POWER_ON_DELAY_MS: u32 = 3;

pub struct LampSensor<I2C> {
    device: Tcs3472<I2C>,
}

impl<I2C: I2c> LampSensor<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            device: Tcs3472::new(i2c),
        }
    }

    /// Checks the part ID, applies integration time and gain, then starts the ADC.
    pub fn init<D: DelayNs>(
        &mut self,
        integration_time_ms: u32,
        gain: RgbCGain,
        delay: &mut D,
    ) -> Result<(), SensorError> {
        let id = self.device.read_device_id().map_err(bus_error)?;
        if !KNOWN_IDS.contains(&id) {
            return Err(SensorError::Bus(format!(
                "unexpected TCS34725 id 0x{id:02X}"
            )));
        }

        self.device
            .set_integration_cycles(integration_cycles(integration_time_ms))
            .map_err(bus_error)?;
        self.device.set_rgbc_gain(gain).map_err(bus_error)?;
        self.device.enable().map_err(bus_error)?;
        delay.delay_ms(POWER_ON_DELAY_MS);
        self.device.enable_rgbc().map_err(bus_error)
    }
}

impl<I2C: I2c> ColorSensor for LampSensor<I2C> {
    fn data_ready(&mut self) -> Result<bool, SensorError> {
        self.device.is_rgbc_status_valid().map_err(bus_error)
    }

    fn read_color(&mut self) -> Result<ColorSample, SensorError> {
        let raw = self.device.read_all_channels().map_err(bus_error)?;
        Ok(ColorSample::from_channels(
            raw.clear, raw.red, raw.green, raw.blue,
        ))
    }
}

/// One integration cycle lasts 2.4 ms; the part accepts 1..=256 cycles.
fn integration_cycles(integration_time_ms: u32) -> u16 {
    (integration_time_ms.saturating_mul(10) / 24).clamp(1, 256) as u16
}

fn bus_error<E: core::fmt::Debug>(err: tcs3472::Error<E>) -> SensorError {
    SensorError::Bus(format!("{err:?}"))
}
