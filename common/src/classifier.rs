use crate::{config::MonitorConfig, types::ColorSample};

/// Recognizes the burner's yellow-green status LED.
///
/// The red-green differential rejects white and ambient light; the blue
/// ceiling rejects blue-dominant ambient and off-state readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorClassifier {
    rg_threshold: f32,
    b_threshold: f32,
}

impl ColorClassifier {
    pub fn new(rg_threshold: f32, b_threshold: f32) -> Self {
        Self {
            rg_threshold,
            b_threshold,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.rg_threshold, config.b_threshold)
    }

    pub fn classify(&self, sample: ColorSample) -> bool {
        sample.green > self.rg_threshold
            && (sample.red - sample.green) < self.rg_threshold
            && sample.blue < self.b_threshold
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}
