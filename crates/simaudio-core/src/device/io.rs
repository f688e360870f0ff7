//! Real-time I/O handler
//!
//! The device hands out a single [`IoHandler`] which the host's real-time
//! thread calls once per I/O operation. Everything the handler reads
//! (mapping flags, selector, gain, format) lives in [`IoShared`] as atomics
//! written from the device work queue, so the handler never locks, never
//! allocates and never logs. Diagnostics leave the real-time path as
//! fixed-size [`IoEvent`]s over a bounded channel.

use crate::audio::clock::{ClockSnapshot, PublishedClock};
use crate::audio::controls::{GainControl, SelectorControl};
use crate::audio::format::StreamFormat;
use crate::audio::ring::RingBuffer;
use crate::audio::router::{CycleContext, IoOperation, SignalRouter};
use crate::device::stream::StreamDirection;
use crate::error::{DeviceError, Result};
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Capacity of the real-time diagnostics channel
pub const IO_EVENT_CAPACITY: usize = 64;

/// Diagnostic emitted by the real-time handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    /// First I/O operation since the handler was created
    FirstCycle { sample_time: u64, host_time: u64 },
    /// An operation found a buffer unmapped and did nothing
    Unmapped {
        operation: IoOperation,
        sample_time: u64,
    },
}

/// State shared between the device and its I/O handler
#[derive(Debug)]
pub(crate) struct IoShared {
    pub(crate) output: RingBuffer,
    pub(crate) input: RingBuffer,
    output_mapped: AtomicBool,
    input_mapped: AtomicBool,
    pub(crate) selector: SelectorControl,
    pub(crate) gain: GainControl,
    /// Current sample rate as f64 bits
    sample_rate: AtomicU64,
    channels_per_frame: AtomicU32,
    /// Latest zero timestamp, written by the work queue
    pub(crate) clock: PublishedClock,
}

impl IoShared {
    pub(crate) fn new(
        output: RingBuffer,
        input: RingBuffer,
        selector: SelectorControl,
        gain: GainControl,
        format: &StreamFormat,
    ) -> Self {
        Self {
            output,
            input,
            output_mapped: AtomicBool::new(false),
            input_mapped: AtomicBool::new(false),
            selector,
            gain,
            sample_rate: AtomicU64::new(format.sample_rate.to_bits()),
            channels_per_frame: AtomicU32::new(format.channels_per_frame),
            clock: PublishedClock::new(),
        }
    }

    pub(crate) fn buffer(&self, direction: StreamDirection) -> &RingBuffer {
        match direction {
            StreamDirection::Output => &self.output,
            StreamDirection::Input => &self.input,
        }
    }

    fn mapped_flag(&self, direction: StreamDirection) -> &AtomicBool {
        match direction {
            StreamDirection::Output => &self.output_mapped,
            StreamDirection::Input => &self.input_mapped,
        }
    }

    pub(crate) fn set_mapped(&self, direction: StreamDirection, mapped: bool) {
        self.mapped_flag(direction).store(mapped, Ordering::Release);
    }

    pub(crate) fn is_mapped(&self, direction: StreamDirection) -> bool {
        self.mapped_flag(direction).load(Ordering::Acquire)
    }

    fn mapped(&self, direction: StreamDirection) -> Option<&RingBuffer> {
        self.is_mapped(direction).then(|| self.buffer(direction))
    }

    pub(crate) fn publish_format(&self, format: &StreamFormat) {
        self.sample_rate
            .store(format.sample_rate.to_bits(), Ordering::Release);
        self.channels_per_frame
            .store(format.channels_per_frame, Ordering::Release);
    }

    fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Acquire))
    }

    fn channels_per_frame(&self) -> u32 {
        self.channels_per_frame.load(Ordering::Acquire)
    }
}

/// Real-time callback registered with the host
///
/// Created once per device and moved to the host's I/O thread. It owns the
/// signal router, so tone phase is continuous for the device's lifetime.
pub struct IoHandler {
    shared: Arc<IoShared>,
    router: SignalRouter,
    events: crossbeam_channel::Sender<IoEvent>,
    /// Copy of every cycle's input samples for monitoring
    tap: Option<HeapProd<i16>>,
    cycles: u64,
}

impl IoHandler {
    pub(crate) fn new(
        shared: Arc<IoShared>,
        events: crossbeam_channel::Sender<IoEvent>,
        tap: Option<HeapProd<i16>>,
    ) -> Self {
        Self {
            shared,
            router: SignalRouter::new(),
            events,
            tap,
            cycles: 0,
        }
    }

    /// Handle one I/O operation for `frame_size` frames at `sample_time`
    pub fn io_operation(
        &mut self,
        operation: IoOperation,
        frame_size: u32,
        sample_time: u64,
        host_time: u64,
    ) -> Result<()> {
        if self.cycles == 0 {
            let _ = self.events.try_send(IoEvent::FirstCycle {
                sample_time,
                host_time,
            });
        }
        self.cycles += 1;

        let ctx = CycleContext {
            source: self.shared.selector.current(),
            gain: self.shared.gain.scalar(),
            sample_rate: self.shared.sample_rate(),
            channels_per_frame: self.shared.channels_per_frame(),
            frame_size,
            sample_time,
            input: self.shared.mapped(StreamDirection::Input),
            output: self.shared.mapped(StreamDirection::Output),
        };

        let result = self.router.route(operation, &ctx);
        match result {
            Ok(()) if operation == IoOperation::BeginRead => Self::feed_tap(&mut self.tap, &ctx),
            Ok(()) => {}
            Err(_) => {
                let _ = self.events.try_send(IoEvent::Unmapped {
                    operation,
                    sample_time,
                });
            }
        }
        result
    }

    fn feed_tap(tap: &mut Option<HeapProd<i16>>, ctx: &CycleContext<'_>) {
        if let (Some(tap), Some(input)) = (tap.as_mut(), ctx.input) {
            let base = (ctx.channels_per_frame as u64).wrapping_mul(ctx.sample_time);
            for i in 0..ctx.channels_per_frame as u64 * ctx.frame_size as u64 {
                if tap.try_push(input.read_slot(base.wrapping_add(i))).is_err() {
                    break;
                }
            }
        }
    }

    /// Host side: write interleaved output samples starting at `sample_time`
    pub fn write_output(&self, sample_time: u64, samples: &[i16]) -> Result<()> {
        let output = self
            .shared
            .mapped(StreamDirection::Output)
            .ok_or(DeviceError::ResourceExhaustion {
                what: "output buffer not mapped",
            })?;
        let base = (self.shared.channels_per_frame() as u64).wrapping_mul(sample_time);
        for (i, &sample) in samples.iter().enumerate() {
            output.write_slot(base.wrapping_add(i as u64), sample);
        }
        Ok(())
    }

    /// Host side: read interleaved input samples starting at `sample_time`
    pub fn read_input(&self, sample_time: u64, out: &mut [i16]) -> Result<()> {
        let input = self
            .shared
            .mapped(StreamDirection::Input)
            .ok_or(DeviceError::ResourceExhaustion {
                what: "input buffer not mapped",
            })?;
        let base = (self.shared.channels_per_frame() as u64).wrapping_mul(sample_time);
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = input.read_slot(base.wrapping_add(i as u64));
        }
        Ok(())
    }

    /// Latest zero timestamp and cadence published by the device
    ///
    /// Hosts anchor each cycle's sample and host time to this.
    pub fn clock_snapshot(&self) -> ClockSnapshot {
        self.shared.clock.load()
    }

    /// Operations handled so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Tone generator phase index
    pub fn tone_phase(&self) -> u64 {
        self.router.tone_generator().phase_sample_index()
    }

    /// Channels per frame of the current format
    pub fn channels_per_frame(&self) -> u32 {
        self.shared.channels_per_frame()
    }

    /// Sample rate of the current format
    pub fn sample_rate(&self) -> f64 {
        self.shared.sample_rate()
    }

    /// Slot count of the input ring buffer
    pub fn input_len(&self) -> usize {
        self.shared.input.len()
    }

    /// Slot count of the output ring buffer
    pub fn output_len(&self) -> usize {
        self.shared.output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::controls::DataSource;
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::HeapRb;

    fn shared(source: DataSource, gain_db: f64) -> Arc<IoShared> {
        let format = StreamFormat::pcm_i16(48000.0, 1);
        Arc::new(IoShared::new(
            RingBuffer::new(64, 1).unwrap(),
            RingBuffer::new(64, 1).unwrap(),
            SelectorControl::new(source),
            GainControl::new(gain_db, (-96.0, 0.0)),
            &format,
        ))
    }

    fn map_both(shared: &IoShared) {
        shared.set_mapped(StreamDirection::Output, true);
        shared.set_mapped(StreamDirection::Input, true);
    }

    #[test]
    fn test_first_cycle_event_sent_once() {
        let shared = shared(DataSource::Tone440, 0.0);
        map_both(&shared);
        let (tx, rx) = crossbeam_channel::bounded(IO_EVENT_CAPACITY);
        let mut handler = IoHandler::new(shared, tx, None);

        handler.io_operation(IoOperation::BeginRead, 16, 0, 42).unwrap();
        handler.io_operation(IoOperation::BeginRead, 16, 16, 43).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            IoEvent::FirstCycle {
                sample_time: 0,
                host_time: 42
            }
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(handler.cycles(), 2);
        assert_eq!(handler.tone_phase(), 32);
    }

    #[test]
    fn test_unmapped_reports_event() {
        let shared = shared(DataSource::Tone440, 0.0);
        let (tx, rx) = crossbeam_channel::bounded(IO_EVENT_CAPACITY);
        let mut handler = IoHandler::new(shared, tx, None);

        assert!(handler.io_operation(IoOperation::BeginRead, 16, 32, 1).is_err());
        let _first = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            IoEvent::Unmapped {
                operation: IoOperation::BeginRead,
                sample_time: 32
            }
        );
        assert!(handler.write_output(0, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_loopback_through_handler() {
        let shared = shared(DataSource::Loopback, 0.0);
        map_both(&shared);
        let (tx, _rx) = crossbeam_channel::bounded(IO_EVENT_CAPACITY);
        let mut handler = IoHandler::new(shared, tx, None);

        let pattern: Vec<i16> = (0..16).map(|i| i * 100 - 800).collect();
        handler.write_output(60, &pattern).unwrap();
        handler.io_operation(IoOperation::WriteEnd, 16, 60, 1).unwrap();
        handler.io_operation(IoOperation::BeginRead, 16, 60, 1).unwrap();

        let mut read = vec![0i16; 16];
        handler.read_input(60, &mut read).unwrap();
        assert_eq!(read, pattern);
        assert_eq!(handler.input_len(), 64);
        assert_eq!(handler.output_len(), 64);
    }

    #[test]
    fn test_tap_receives_input() {
        let shared = shared(DataSource::Tone660, -6.0);
        map_both(&shared);
        let (tx, _rx) = crossbeam_channel::bounded(IO_EVENT_CAPACITY);
        let (producer, mut consumer) = HeapRb::<i16>::new(128).split();
        let mut handler = IoHandler::new(shared, tx, Some(producer));

        handler.io_operation(IoOperation::BeginRead, 32, 0, 1).unwrap();
        let mut expected = vec![0i16; 32];
        handler.read_input(0, &mut expected).unwrap();

        let tapped: Vec<i16> = consumer.pop_iter().collect();
        assert_eq!(tapped, expected);
        assert!(tapped.iter().any(|&s| s != 0));
    }
}
