//! Simaudio - emulated timer-driven audio device
//!
//! This library re-exports the device core from `simaudio-core` and adds the
//! pieces the command-line host needs: persistent configuration and a host
//! loop that drives the device's real-time I/O handler.

pub mod config;
pub mod host;

pub use simaudio_core::{audio, device, error};

pub use simaudio_core::{
    DataSource, Device, DeviceConfig, DeviceError, DeviceHandle, DeviceStatus, ErrorKind,
    ExternalMethod, HostClock, IoHandler, IoOperation, ManualHostClock, MonotonicHostClock,
    UserClient, ZeroTimestamp, ZeroTimestampClock,
};
pub use simaudio_core::{BUILD_DATE, CHANNELS_PER_FRAME, SUPPORTED_SAMPLE_RATES, VERSION};
