//! Input and output stream objects

use crate::audio::format::StreamFormat;
use crate::error::{DeviceError, Result};
use serde::Serialize;

/// Direction of a stream relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamDirection {
    /// Host writes, device consumes
    Output,
    /// Device produces, host reads
    Input,
}

/// A device stream with its advertised and current formats
#[derive(Debug, Clone)]
pub struct Stream {
    name: String,
    direction: StreamDirection,
    available_formats: Vec<StreamFormat>,
    current_format: StreamFormat,
}

impl Stream {
    /// Create a stream whose current format is the first available one
    pub fn new(
        name: impl Into<String>,
        direction: StreamDirection,
        available_formats: Vec<StreamFormat>,
    ) -> Result<Self> {
        let current_format = *available_formats.first().ok_or_else(|| {
            DeviceError::UnsupportedConfiguration("stream has no formats".to_string())
        })?;
        if let Some(bad) = available_formats.iter().find(|f| !f.is_valid()) {
            return Err(DeviceError::UnsupportedConfiguration(format!(
                "inconsistent frame layout at {} Hz",
                bad.sample_rate
            )));
        }
        Ok(Self {
            name: name.into(),
            direction,
            available_formats,
            current_format,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn available_formats(&self) -> &[StreamFormat] {
        &self.available_formats
    }

    pub fn current_format(&self) -> StreamFormat {
        self.current_format
    }

    /// Advertised format running at `sample_rate`, if any
    pub fn format_for_rate(&self, sample_rate: f64) -> Option<StreamFormat> {
        self.available_formats
            .iter()
            .copied()
            .find(|f| StreamFormat::same_rate(f.sample_rate, sample_rate))
    }

    /// Switch to one of the advertised formats
    pub fn set_current_format(&mut self, format: StreamFormat) -> Result<()> {
        if !format.is_valid() || !self.available_formats.contains(&format) {
            return Err(DeviceError::UnsupportedConfiguration(format!(
                "{}: format at {} Hz is not advertised",
                self.name, format.sample_rate
            )));
        }
        self.current_format = format;
        Ok(())
    }

    /// Follow a device sample rate change
    pub fn device_sample_rate_changed(&mut self, sample_rate: f64) -> Result<StreamFormat> {
        let format = self.format_for_rate(sample_rate).ok_or_else(|| {
            DeviceError::UnsupportedConfiguration(format!(
                "{}: no format at {} Hz",
                self.name, sample_rate
            ))
        })?;
        self.current_format = format;
        Ok(format)
    }
}
