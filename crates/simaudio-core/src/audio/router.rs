//! Per-cycle input signal routing
//!
//! On the begin-read phase of an I/O cycle the router fills the input ring
//! buffer either with a synthesized tone or with a gain-scaled copy of the
//! output ring buffer. The write-end phase is a no-op: output consumption is
//! handled by the host.

use crate::audio::controls::DataSource;
use crate::audio::ring::RingBuffer;
use crate::audio::tone::ToneGenerator;
use crate::error::{DeviceError, Result};

/// Phase of an I/O cycle the host is notifying the device about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Host finished writing the output buffer for this cycle
    WriteEnd,
    /// Host is about to read the input buffer for this cycle
    BeginRead,
}

/// Everything the router needs for one cycle, read fresh by the caller
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub source: DataSource,
    /// Linear input gain
    pub gain: f32,
    pub sample_rate: f64,
    pub channels_per_frame: u32,
    /// Frames in this cycle
    pub frame_size: u32,
    /// Absolute sample time of the first frame
    pub sample_time: u64,
    /// Input ring buffer, `None` while unmapped
    pub input: Option<&'a RingBuffer>,
    /// Output ring buffer, `None` while unmapped
    pub output: Option<&'a RingBuffer>,
}

/// Chooses between tone generation and loopback each cycle
///
/// Owns the tone generator so its phase survives start/stop cycles and
/// selector changes.
#[derive(Debug, Default)]
pub struct SignalRouter {
    tone: ToneGenerator,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one I/O operation
    ///
    /// Never allocates. A missing mapping returns
    /// [`DeviceError::ResourceExhaustion`] before anything is written.
    pub fn route(&mut self, operation: IoOperation, ctx: &CycleContext<'_>) -> Result<()> {
        match operation {
            IoOperation::WriteEnd => Ok(()),
            IoOperation::BeginRead => match ctx.source.frequency() {
                None => Self::loopback(ctx),
                Some(frequency) => self.tone(frequency, ctx),
            },
        }
    }

    fn loopback(ctx: &CycleContext<'_>) -> Result<()> {
        let (input, output) = match (ctx.input, ctx.output) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                return Err(DeviceError::ResourceExhaustion {
                    what: "loopback buffers not mapped",
                })
            }
        };

        let channels = ctx.channels_per_frame as u64;
        let base = channels.wrapping_mul(ctx.sample_time);
        for i in 0..channels * ctx.frame_size as u64 {
            let slot = base.wrapping_add(i);
            let sample = output.read_slot(slot);
            input.write_slot(slot, (ctx.gain * sample as f32) as i16);
        }
        Ok(())
    }

    fn tone(&mut self, frequency: f64, ctx: &CycleContext<'_>) -> Result<()> {
        let input = ctx.input.ok_or(DeviceError::ResourceExhaustion {
            what: "input buffer not mapped",
        })?;

        for frame in 0..ctx.frame_size as u64 {
            let value = self.tone.next_sample(frequency, ctx.sample_rate, ctx.gain);
            let frame_index = ctx.sample_time.wrapping_add(frame);
            for channel in 0..ctx.channels_per_frame as usize {
                input.write(frame_index, channel, value);
            }
        }
        Ok(())
    }

    /// Tone generator state
    pub fn tone_generator(&self) -> &ToneGenerator {
        &self.tone
    }
}
