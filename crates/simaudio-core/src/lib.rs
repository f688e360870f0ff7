//! Simaudio Core - real-time I/O core of an emulated audio device
//!
//! A single device with one input and one output stream, driven by a
//! software timer that stands in for a hardware interrupt. The timer feeds a
//! zero-timestamp clock; a real-time handler fills the input stream with a
//! sine tone or loops the output stream back into it.

pub mod audio;
pub mod config;
pub mod device;
pub mod error;

pub use audio::clock::{HostClock, ManualHostClock, MonotonicHostClock, ZeroTimestamp, ZeroTimestampClock};
pub use audio::controls::DataSource;
pub use audio::router::IoOperation;
pub use config::DeviceConfig;
pub use device::client::{ExternalMethod, UserClient};
pub use device::controller::{Device, DeviceStatus};
pub use device::io::IoHandler;
pub use device::queue::DeviceHandle;
pub use error::{DeviceError, ErrorKind, Result};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Sample rates the device can run at, in toggle order
pub const SUPPORTED_SAMPLE_RATES: [f64; 2] = [44100.0, 48000.0];

/// Channels in every stream
pub const CHANNELS_PER_FRAME: u32 = 1;

/// Default frames between zero timestamps
pub const DEFAULT_ZERO_TIMESTAMP_PERIOD: u32 = 512;
