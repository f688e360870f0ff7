//! Host-facing command surface
//!
//! A user client opens a session on the device and issues argument-less
//! commands. Each command answers with a short human-readable status.

use crate::device::queue::DeviceHandle;
use crate::error::{DeviceError, Result};

/// Commands a user client can invoke, by selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalMethod {
    Open,
    Close,
    /// Cycle the input data source
    ToggleDataSource,
    /// Toggle the sample rate through the configuration change protocol
    TestConfigChange,
}

impl TryFrom<u64> for ExternalMethod {
    type Error = DeviceError;

    fn try_from(selector: u64) -> Result<Self> {
        match selector {
            0 => Ok(ExternalMethod::Open),
            1 => Ok(ExternalMethod::Close),
            2 => Ok(ExternalMethod::ToggleDataSource),
            3 => Ok(ExternalMethod::TestConfigChange),
            other => Err(DeviceError::UnsupportedConfiguration(format!(
                "unknown external method selector {}",
                other
            ))),
        }
    }
}

/// Client session bound to one device
pub struct UserClient {
    device: DeviceHandle,
    open: bool,
}

impl UserClient {
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            open: false,
        }
    }

    /// Dispatch by raw selector
    pub fn call_selector(&mut self, selector: u64) -> Result<String> {
        self.call(ExternalMethod::try_from(selector)?)
    }

    /// Run one command
    pub fn call(&mut self, method: ExternalMethod) -> Result<String> {
        tracing::debug!(?method, "User client command");
        match method {
            ExternalMethod::Open => self.open(),
            ExternalMethod::Close => self.close(),
            ExternalMethod::ToggleDataSource => self.toggle_data_source(),
            ExternalMethod::TestConfigChange => self.toggle_rate(),
        }
    }

    pub fn open(&mut self) -> Result<String> {
        if self.open {
            return Err(DeviceError::InvalidState {
                operation: "open",
                reason: "client is already open",
            });
        }
        self.open = true;
        Ok("Opened".to_string())
    }

    pub fn close(&mut self) -> Result<String> {
        self.require_open("close")?;
        self.open = false;
        Ok("Closed".to_string())
    }

    pub fn toggle_data_source(&mut self) -> Result<String> {
        self.require_open("toggle_data_source")?;
        let source = self.device.toggle_data_source()?;
        Ok(format!("Data source: {}", source))
    }

    pub fn toggle_rate(&mut self) -> Result<String> {
        self.require_open("test_config_change")?;
        let rate = self.device.test_config_change()?;
        Ok(format!("Sample rate: {} Hz", rate))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::InvalidState {
                operation,
                reason: "client is not open",
            })
        }
    }
}
