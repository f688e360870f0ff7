//! Host loop driving the device's I/O handler
//!
//! Plays the part of the host audio framework: once per buffer it writes a
//! test tone into the device's output stream, then issues the write-end and
//! begin-read operations so the device fills its input stream.
//!
//! Cycle times are anchored to the zero timestamps the device publishes. A
//! new clock epoch (I/O restarted) or a host that fell behind the latest
//! timestamp resynchronizes to it.

use simaudio_core::audio::tone::ToneGenerator;
use simaudio_core::{DeviceError, IoHandler, IoOperation};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Frames per host I/O cycle
pub const DEFAULT_FRAME_SIZE: u32 = 256;

/// Frequency of the tone the host plays into the output stream
pub const DEFAULT_OUTPUT_FREQUENCY: f64 = 1000.0;

/// Host loop settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSettings {
    pub frame_size: u32,
    pub output_frequency: f64,
    pub output_volume: f32,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            output_frequency: DEFAULT_OUTPUT_FREQUENCY,
            output_volume: 0.5,
        }
    }
}

/// One host I/O cycle at a time, without threads or sleeping
#[derive(Debug)]
pub struct HostCycle {
    settings: HostSettings,
    tone: ToneGenerator,
    buffer: Vec<i16>,
    /// Clock epoch the sample time is anchored to
    epoch: Option<u64>,
    sample_time: u64,
    failures: u64,
}

impl HostCycle {
    pub fn new(settings: HostSettings) -> Self {
        Self {
            settings,
            tone: ToneGenerator::new(),
            buffer: Vec::with_capacity(settings.frame_size as usize),
            epoch: None,
            sample_time: 0,
            failures: 0,
        }
    }

    /// Run one cycle; returns the sample time it covered
    ///
    /// Fails without touching the device until the first zero timestamp of
    /// the current epoch has been published.
    pub fn step(&mut self, handler: &mut IoHandler) -> simaudio_core::Result<u64> {
        let snapshot = handler.clock_snapshot();
        let zts = snapshot.zero_timestamp;
        if !zts.is_initialized() {
            self.failures += 1;
            return Err(DeviceError::InvalidState {
                operation: "host_cycle",
                reason: "no zero timestamp published yet",
            });
        }
        if self.epoch != Some(snapshot.epoch) || self.sample_time < zts.sample_time {
            self.epoch = Some(snapshot.epoch);
            self.sample_time = zts.sample_time;
        }

        let sample_time = self.sample_time;
        let host_time = snapshot.host_time_at(sample_time);
        let channels = handler.channels_per_frame().max(1) as usize;
        let frame_size = self.settings.frame_size;
        let sample_rate = handler.sample_rate();

        self.buffer.resize(frame_size as usize * channels, 0);
        for frame in self.buffer.chunks_exact_mut(channels) {
            let value = self.tone.next_sample(
                self.settings.output_frequency,
                sample_rate,
                self.settings.output_volume,
            );
            frame.fill(value);
        }

        let result = handler
            .write_output(sample_time, &self.buffer)
            .and_then(|_| handler.io_operation(IoOperation::WriteEnd, frame_size, sample_time, host_time))
            .and_then(|_| handler.io_operation(IoOperation::BeginRead, frame_size, sample_time, host_time));

        self.sample_time = self.sample_time.wrapping_add(frame_size as u64);
        if result.is_err() {
            self.failures += 1;
        }
        result.map(|_| sample_time)
    }

    /// Sample time of the next cycle
    pub fn sample_time(&self) -> u64 {
        self.sample_time
    }

    /// Cycles that returned an error
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Wall time one cycle covers at `sample_rate`
    pub fn cycle_duration(&self, sample_rate: f64) -> Duration {
        Duration::from_secs_f64(self.settings.frame_size as f64 / sample_rate)
    }
}

/// Background thread calling [`HostCycle::step`] in real time
pub struct HostLoop {
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    thread: Option<JoinHandle<IoHandler>>,
}

impl HostLoop {
    /// Move `handler` to a new host I/O thread
    pub fn spawn(mut handler: IoHandler, settings: HostSettings) -> anyhow::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let cycles = Arc::new(AtomicU64::new(0));

        let thread = {
            let running = Arc::clone(&running);
            let cycles = Arc::clone(&cycles);
            std::thread::Builder::new()
                .name("simaudio-host-io".to_string())
                .spawn(move || {
                    let mut cycle = HostCycle::new(settings);
                    let mut healthy = true;
                    while running.load(Ordering::SeqCst) {
                        let ok = cycle.step(&mut handler).is_ok();
                        if ok != healthy {
                            tracing::debug!(ok, sample_time = cycle.sample_time(), "Host I/O state changed");
                            healthy = ok;
                        }
                        cycles.fetch_add(1, Ordering::Relaxed);
                        std::thread::sleep(cycle.cycle_duration(handler.sample_rate()));
                    }
                    tracing::debug!(failures = cycle.failures(), "Host I/O loop stopped");
                    handler
                })?
        };

        tracing::info!(
            frame_size = settings.frame_size,
            frequency = settings.output_frequency,
            "Host I/O loop started"
        );

        Ok(Self {
            running,
            cycles,
            thread: Some(thread),
        })
    }

    /// Cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Stop the thread and hand the I/O handler back
    pub fn stop(mut self) -> Option<IoHandler> {
        self.running.store(false, Ordering::SeqCst);
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl Drop for HostLoop {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
