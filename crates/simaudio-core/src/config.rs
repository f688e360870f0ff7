//! Device configuration
//!
//! Every field has a serde default so partial JSON documents load cleanly.

use crate::audio::controls::{DataSource, DEFAULT_GAIN_DB, GAIN_RANGE_DB};
use crate::audio::format::StreamFormat;
use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};

fn default_device_uid() -> String {
    "simaudio-device".to_string()
}

fn default_model_uid() -> String {
    "simaudio-model".to_string()
}

fn default_manufacturer_uid() -> String {
    "simaudio".to_string()
}

fn default_zero_timestamp_period() -> u32 {
    crate::DEFAULT_ZERO_TIMESTAMP_PERIOD
}

fn default_sample_rate() -> f64 {
    crate::SUPPORTED_SAMPLE_RATES[0]
}

fn default_gain_db() -> f64 {
    DEFAULT_GAIN_DB
}

fn default_data_source() -> DataSource {
    DataSource::Tone440
}

fn default_supports_prewarming() -> bool {
    true
}

fn default_tap_capacity() -> usize {
    16384
}

/// Settings applied when a device is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_uid")]
    pub device_uid: String,
    #[serde(default = "default_model_uid")]
    pub model_uid: String,
    #[serde(default = "default_manufacturer_uid")]
    pub manufacturer_uid: String,
    /// Frames between zero timestamps; also the ring buffer capacity
    #[serde(default = "default_zero_timestamp_period")]
    pub zero_timestamp_period: u32,
    /// Initial sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Initial input gain in dB
    #[serde(default = "default_gain_db")]
    pub gain_db: f64,
    /// Initial input data source
    #[serde(default = "default_data_source")]
    pub data_source: DataSource,
    #[serde(default = "default_supports_prewarming")]
    pub supports_prewarming: bool,
    /// Capacity of the input monitoring tap in samples (0 disables it)
    #[serde(default = "default_tap_capacity")]
    pub tap_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_uid: default_device_uid(),
            model_uid: default_model_uid(),
            manufacturer_uid: default_manufacturer_uid(),
            zero_timestamp_period: default_zero_timestamp_period(),
            sample_rate: default_sample_rate(),
            gain_db: default_gain_db(),
            data_source: default_data_source(),
            supports_prewarming: default_supports_prewarming(),
            tap_capacity: default_tap_capacity(),
        }
    }
}

impl DeviceConfig {
    /// Reject settings the device cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.zero_timestamp_period == 0 {
            return Err(DeviceError::UnsupportedConfiguration(
                "zero timestamp period must be at least one frame".to_string(),
            ));
        }
        if !crate::SUPPORTED_SAMPLE_RATES
            .iter()
            .any(|&r| StreamFormat::same_rate(r, self.sample_rate))
        {
            return Err(DeviceError::UnsupportedConfiguration(format!(
                "sample rate {} Hz (supported: {:?})",
                self.sample_rate,
                crate::SUPPORTED_SAMPLE_RATES
            )));
        }
        let (min_db, max_db) = GAIN_RANGE_DB;
        if !(min_db..=max_db).contains(&self.gain_db) {
            return Err(DeviceError::UnsupportedConfiguration(format!(
                "gain {} dB outside [{}, {}]",
                self.gain_db, min_db, max_db
            )));
        }
        Ok(())
    }
}
