//! Device controller
//!
//! Owns the streams, controls, ring buffers and zero-timestamp clock of the
//! emulated device. Every method here runs on the device work queue (see
//! [`queue`](crate::device::queue)); only the [`IoHandler`] runs elsewhere.
//!
//! ## Sample rate changes
//!
//! A rate change is a two-phase protocol: the change is first requested
//! ([`Device::request_config_change`]) and later either committed by the host
//! ([`Device::perform_config_change`]) or vetoed
//! ([`Device::abort_config_change`]). Committing validates the new rate
//! against both streams before touching anything, so a failure leaves the
//! device at its last committed rate. Every committed change recomputes the
//! clock cadence.

use crate::audio::clock::{ClockSnapshot, ClockState, HostClock, ZeroTimestamp, ZeroTimestampClock};
use crate::audio::controls::{DataSource, GainControl, SelectorControl, GAIN_RANGE_DB};
use crate::audio::format::{supported_formats, StreamFormat};
use crate::audio::ring::RingBuffer;
use crate::config::DeviceConfig;
use crate::device::io::{IoEvent, IoHandler, IoShared, IO_EVENT_CAPACITY};
use crate::device::property::CustomProperty;
use crate::device::stream::{Stream, StreamDirection};
use crate::error::{DeviceError, Result};
use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapRb};
use serde::Serialize;
use std::sync::Arc;

/// Consumer side of the input monitoring tap
pub type InputTap = HeapCons<i16>;

/// Makes a stream's ring buffer reachable from the I/O handler
///
/// Stands where a platform would map driver memory into the I/O callback's
/// address space.
pub trait BufferMapper: Send {
    fn map(&mut self, direction: StreamDirection, buffer: &RingBuffer) -> Result<()>;

    fn unmap(&mut self, _direction: StreamDirection) {}
}

/// Mapper for buffers that already live in the handler's address space
#[derive(Debug, Default)]
pub struct DirectMapper;

impl BufferMapper for DirectMapper {
    fn map(&mut self, _direction: StreamDirection, _buffer: &RingBuffer) -> Result<()> {
        Ok(())
    }
}

/// Configuration change the host can be asked to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigChangeAction {
    /// Toggle between the two supported sample rates
    ToggleSampleRate,
    /// Any other action code, handled by the base implementation
    Other(u64),
}

impl ConfigChangeAction {
    const TOGGLE_SAMPLE_RATE_CODE: u64 = 1;

    pub fn code(self) -> u64 {
        match self {
            ConfigChangeAction::ToggleSampleRate => Self::TOGGLE_SAMPLE_RATE_CODE,
            ConfigChangeAction::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            Self::TOGGLE_SAMPLE_RATE_CODE => ConfigChangeAction::ToggleSampleRate,
            other => ConfigChangeAction::Other(other),
        }
    }
}

/// A requested change waiting for the host to commit or abort
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingConfigChange {
    pub action: ConfigChangeAction,
    pub info: Option<String>,
}

/// Snapshot of device state, safe to send between threads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device_uid: String,
    pub io_running: bool,
    pub clock_state: ClockState,
    pub sample_rate: f64,
    pub data_source: DataSource,
    pub gain_db: f64,
    pub zero_timestamp: ZeroTimestamp,
    pub ticks_per_buffer: u64,
    pub zero_timestamp_period: u32,
    pub output_mapped: bool,
    pub input_mapped: bool,
    pub pending_change: Option<PendingConfigChange>,
}

/// The emulated audio device
pub struct Device {
    config: DeviceConfig,
    host_clock: Arc<dyn HostClock>,
    mapper: Box<dyn BufferMapper>,
    sample_rate: f64,
    /// Cached copy of the input stream's current format
    stream_format: StreamFormat,
    output_stream: Stream,
    input_stream: Stream,
    shared: Arc<IoShared>,
    io_handler: Option<IoHandler>,
    input_tap: Option<InputTap>,
    io_events: crossbeam_channel::Receiver<IoEvent>,
    clock: ZeroTimestampClock,
    /// Number of times the clock has been started
    clock_epoch: u64,
    io_running: bool,
    pending_change: Option<PendingConfigChange>,
    custom_property: CustomProperty,
}

impl Device {
    /// Create a device whose buffers need no platform mapping
    pub fn new(config: DeviceConfig, host_clock: Arc<dyn HostClock>) -> Result<Self> {
        Self::with_mapper(config, host_clock, Box::new(DirectMapper))
    }

    /// Create a device with a custom buffer mapper
    ///
    /// Every check runs before any allocation, and a failed allocation drops
    /// whatever was already built, so no partially initialized device is
    /// ever returned.
    pub fn with_mapper(
        config: DeviceConfig,
        host_clock: Arc<dyn HostClock>,
        mapper: Box<dyn BufferMapper>,
    ) -> Result<Self> {
        config.validate()?;

        let formats = supported_formats();
        let mut output_stream = Stream::new("Emulated Output", StreamDirection::Output, formats.clone())?;
        let mut input_stream = Stream::new("Emulated Input", StreamDirection::Input, formats)?;
        let stream_format = input_stream.device_sample_rate_changed(config.sample_rate)?;
        output_stream.device_sample_rate_changed(config.sample_rate)?;

        let frames = config.zero_timestamp_period as usize;
        let channels = stream_format.channels_per_frame as usize;
        let output = RingBuffer::new(frames, channels)?;
        let input = RingBuffer::new(frames, channels)?;

        let shared = Arc::new(IoShared::new(
            output,
            input,
            SelectorControl::new(config.data_source),
            GainControl::new(config.gain_db, GAIN_RANGE_DB),
            &stream_format,
        ));

        let (tap_producer, input_tap) = if config.tap_capacity > 0 {
            let (producer, consumer) = HeapRb::<i16>::new(config.tap_capacity).split();
            (Some(producer), Some(consumer))
        } else {
            (None, None)
        };

        let (event_tx, io_events) = crossbeam_channel::bounded(IO_EVENT_CAPACITY);
        let io_handler = IoHandler::new(Arc::clone(&shared), event_tx, tap_producer);

        let clock = ZeroTimestampClock::new(
            config.zero_timestamp_period,
            stream_format.sample_rate,
            host_clock.timebase(),
        );

        tracing::info!(
            uid = %config.device_uid,
            sample_rate = stream_format.sample_rate,
            period = config.zero_timestamp_period,
            buffer_bytes = shared.input.byte_len(),
            "Device initialized"
        );

        Ok(Self {
            sample_rate: stream_format.sample_rate,
            config,
            host_clock,
            mapper,
            stream_format,
            output_stream,
            input_stream,
            shared,
            io_handler: Some(io_handler),
            input_tap,
            io_events,
            clock,
            clock_epoch: 0,
            io_running: false,
            pending_change: None,
            custom_property: CustomProperty::default(),
        })
    }

    /// Take the real-time handler to register with the host (once)
    pub fn take_io_handler(&mut self) -> Option<IoHandler> {
        self.io_handler.take()
    }

    /// Take the consumer of the input monitoring tap (once)
    pub fn take_input_tap(&mut self) -> Option<InputTap> {
        self.input_tap.take()
    }

    /// Map both ring buffers and arm the zero-timestamp clock
    ///
    /// Does nothing if I/O is already running. A mapping failure stops I/O,
    /// releases every mapping and returns the error.
    pub fn start_io(&mut self) -> Result<()> {
        if self.io_running {
            tracing::debug!("start_io: I/O already running");
            return Ok(());
        }

        self.io_running = true;
        for direction in [StreamDirection::Output, StreamDirection::Input] {
            if let Err(e) = self.mapper.map(direction, self.shared.buffer(direction)) {
                tracing::error!(?direction, error = %e, "Failed to map ring buffer");
                self.release_io();
                return Err(e);
            }
            self.shared.set_mapped(direction, true);
        }

        let deadline = self.clock.start(self.host_clock.now());
        self.clock_epoch += 1;
        self.publish_clock();
        tracing::info!(
            sample_rate = self.sample_rate,
            ticks_per_buffer = self.clock.ticks_per_buffer(),
            first_deadline = deadline,
            "I/O started"
        );
        Ok(())
    }

    /// Stop the clock, release the buffers, then stop base I/O
    ///
    /// A failure of the base stop sequence is logged and returned.
    pub fn stop_io(&mut self) -> Result<()> {
        let was_running = self.io_running;
        self.release_io();

        if !was_running {
            let err = DeviceError::InvalidState {
                operation: "stop_io",
                reason: "I/O is not running",
            };
            tracing::warn!(error = %err, "Failed to stop I/O");
            return Err(err);
        }

        tracing::info!(zero_timestamp = ?self.clock.current(), "I/O stopped");
        Ok(())
    }

    fn release_io(&mut self) {
        self.clock.stop();
        for direction in [StreamDirection::Output, StreamDirection::Input] {
            if self.shared.is_mapped(direction) {
                self.shared.set_mapped(direction, false);
                self.mapper.unmap(direction);
            }
        }
        self.io_running = false;
    }

    /// Timer firing at host time `now`
    ///
    /// Drains real-time diagnostics, then advances the clock. Returns the new
    /// timestamp, or `None` if the timer is disabled.
    pub fn on_timer(&mut self, now: u64) -> Option<ZeroTimestamp> {
        self.drain_io_events();
        let zts = self.clock.fire(now)?;
        self.publish_clock();
        tracing::trace!(
            sample_time = zts.sample_time,
            host_time = zts.host_time,
            "Zero timestamp"
        );
        Some(zts)
    }

    /// Make the clock state visible to the I/O handler
    fn publish_clock(&self) {
        self.shared.clock.store(ClockSnapshot {
            epoch: self.clock_epoch,
            zero_timestamp: self.clock.current(),
            ticks_per_buffer: self.clock.ticks_per_buffer(),
            period: self.clock.period(),
        });
    }

    fn drain_io_events(&self) {
        while let Ok(event) = self.io_events.try_recv() {
            match event {
                IoEvent::FirstCycle {
                    sample_time,
                    host_time,
                } => tracing::info!(sample_time, host_time, "I/O handler started"),
                IoEvent::Unmapped {
                    operation,
                    sample_time,
                } => tracing::warn!(?operation, sample_time, "I/O operation with unmapped buffer"),
            }
        }
    }

    /// Absolute host time of the next timer firing
    pub fn timer_deadline(&self) -> Option<u64> {
        self.clock.next_deadline()
    }

    /// Advance the input data source: Tone440 → Tone660 → Loopback → Tone440
    pub fn toggle_data_source(&mut self) -> DataSource {
        let source = self.shared.selector.toggle();
        tracing::debug!(source = %source, "Data source toggled");
        source
    }

    pub fn set_data_source(&mut self, source: DataSource) {
        self.shared.selector.set(source);
        tracing::debug!(source = %source, "Data source set");
    }

    /// Set the input gain; returns the value applied after clamping
    pub fn set_gain_db(&mut self, db: f64) -> f64 {
        let applied = self.shared.gain.set_db(db);
        tracing::debug!(requested = db, applied, "Input gain set");
        applied
    }

    /// Phase one: ask the host to schedule a configuration change
    pub fn request_config_change(
        &mut self,
        action: ConfigChangeAction,
        info: Option<String>,
    ) -> Result<()> {
        if self.pending_change.is_some() {
            return Err(DeviceError::InvalidState {
                operation: "request_config_change",
                reason: "a configuration change is already pending",
            });
        }
        tracing::debug!(?action, info = info.as_deref(), "Configuration change requested");
        self.pending_change = Some(PendingConfigChange { action, info });
        Ok(())
    }

    /// Phase two: the host commits a configuration change
    pub fn perform_config_change(
        &mut self,
        action: ConfigChangeAction,
        info: Option<&str>,
    ) -> Result<()> {
        self.pending_change = None;
        tracing::debug!(code = action.code(), info, "Performing configuration change");

        let result = match action {
            ConfigChangeAction::ToggleSampleRate => {
                let [first, second] = crate::SUPPORTED_SAMPLE_RATES;
                let rate = if StreamFormat::same_rate(self.sample_rate, first) {
                    second
                } else {
                    first
                };
                self.apply_sample_rate(rate)
            }
            ConfigChangeAction::Other(_) => Ok(()),
        };

        self.stream_format = self.input_stream.current_format();
        result
    }

    /// The host vetoed a requested change; nothing to undo
    pub fn abort_config_change(&mut self, action: ConfigChangeAction, info: Option<&str>) -> Result<()> {
        self.pending_change = None;
        tracing::debug!(?action, info, "Configuration change aborted");
        Ok(())
    }

    /// Request and immediately commit a sample rate toggle
    ///
    /// Returns the new sample rate.
    pub fn test_config_change(&mut self, info: Option<String>) -> Result<f64> {
        let action = ConfigChangeAction::ToggleSampleRate;
        self.request_config_change(action, info.clone())?;
        self.perform_config_change(action, info.as_deref())?;
        Ok(self.sample_rate)
    }

    /// Host-initiated sample rate change; requires I/O to be stopped
    pub fn handle_change_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        if self.io_running {
            return Err(DeviceError::InvalidState {
                operation: "handle_change_sample_rate",
                reason: "I/O is running",
            });
        }
        self.apply_sample_rate(sample_rate)
    }

    fn apply_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        let (input_format, output_format) = match (
            self.input_stream.format_for_rate(sample_rate),
            self.output_stream.format_for_rate(sample_rate),
        ) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                return Err(DeviceError::UnsupportedConfiguration(format!(
                    "sample rate {} Hz",
                    sample_rate
                )))
            }
        };

        self.input_stream.set_current_format(input_format)?;
        self.output_stream.set_current_format(output_format)?;
        self.sample_rate = input_format.sample_rate;
        self.stream_format = input_format;
        self.shared.publish_format(&input_format);
        self.clock.recompute_ticks_per_buffer(self.sample_rate);
        self.publish_clock();

        tracing::info!(
            sample_rate = self.sample_rate,
            ticks_per_buffer = self.clock.ticks_per_buffer(),
            "Sample rate changed"
        );
        Ok(())
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn stream_format(&self) -> StreamFormat {
        self.stream_format
    }

    pub fn stream(&self, direction: StreamDirection) -> &Stream {
        match direction {
            StreamDirection::Output => &self.output_stream,
            StreamDirection::Input => &self.input_stream,
        }
    }

    pub fn data_source(&self) -> DataSource {
        self.shared.selector.current()
    }

    pub fn gain_db(&self) -> f64 {
        self.shared.gain.db()
    }

    pub fn zero_timestamp(&self) -> ZeroTimestamp {
        self.clock.current()
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn ticks_per_buffer(&self) -> u64 {
        self.clock.ticks_per_buffer()
    }

    pub fn is_io_running(&self) -> bool {
        self.io_running
    }

    pub fn is_mapped(&self, direction: StreamDirection) -> bool {
        self.shared.is_mapped(direction)
    }

    pub fn pending_config_change(&self) -> Option<&PendingConfigChange> {
        self.pending_change.as_ref()
    }

    pub fn custom_property(&self) -> &CustomProperty {
        &self.custom_property
    }

    pub fn custom_property_mut(&mut self) -> &mut CustomProperty {
        &mut self.custom_property
    }

    pub fn host_clock(&self) -> &Arc<dyn HostClock> {
        &self.host_clock
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            device_uid: self.config.device_uid.clone(),
            io_running: self.io_running,
            clock_state: self.clock.state(),
            sample_rate: self.sample_rate,
            data_source: self.data_source(),
            gain_db: self.gain_db(),
            zero_timestamp: self.clock.current(),
            ticks_per_buffer: self.clock.ticks_per_buffer(),
            zero_timestamp_period: self.config.zero_timestamp_period,
            output_mapped: self.is_mapped(StreamDirection::Output),
            input_mapped: self.is_mapped(StreamDirection::Input),
            pending_change: self.pending_change.clone(),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.io_running {
            let _ = self.stop_io();
        }
    }
}
