//! Fixed-capacity I/O ring buffer
//!
//! Index-addressed circular storage of 16-bit samples shared between the
//! device, the host and the real-time I/O handler. Every index is reduced
//! modulo the slot count, so no access can go out of bounds. Slots are
//! atomics with relaxed ordering: readers tolerate stale data for at most one
//! I/O cycle and never block.

use crate::error::{DeviceError, Result};
use std::sync::atomic::{AtomicI16, Ordering};

/// Circular buffer of interleaved 16-bit samples
#[derive(Debug)]
pub struct RingBuffer {
    /// Capacity in frames
    capacity_frames: usize,
    /// Interleaved channels per frame
    channel_count: usize,
    /// `capacity_frames * channel_count` sample slots
    storage: Box<[AtomicI16]>,
}

impl RingBuffer {
    /// Allocate a zeroed ring buffer
    ///
    /// This is the only allocation a ring buffer ever makes. A zero-sized
    /// request or a failed allocation is reported as
    /// [`DeviceError::ResourceExhaustion`].
    ///
    /// # Example
    /// ```
    /// use simaudio_core::audio::ring::RingBuffer;
    ///
    /// let ring = RingBuffer::new(512, 1).unwrap();
    /// assert_eq!(ring.len(), 512);
    /// assert_eq!(ring.byte_len(), 1024);
    /// ```
    pub fn new(capacity_frames: usize, channel_count: usize) -> Result<Self> {
        let slots = capacity_frames
            .checked_mul(channel_count)
            .filter(|&n| n > 0)
            .ok_or(DeviceError::ResourceExhaustion {
                what: "ring buffer has no capacity",
            })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(slots)
            .map_err(|_| DeviceError::ResourceExhaustion {
                what: "ring buffer allocation failed",
            })?;
        storage.extend((0..slots).map(|_| AtomicI16::new(0)));

        Ok(Self {
            capacity_frames,
            channel_count,
            storage: storage.into_boxed_slice(),
        })
    }

    /// Write one channel sample of the frame at `index`
    #[inline]
    pub fn write(&self, index: u64, channel_index: usize, sample: i16) {
        self.write_slot(self.frame_slot(index, channel_index), sample);
    }

    /// Read one channel sample of the frame at `index`
    #[inline]
    pub fn read(&self, index: u64, channel_index: usize) -> i16 {
        self.read_slot(self.frame_slot(index, channel_index))
    }

    /// Write a raw interleaved slot, reduced modulo [`len`](Self::len)
    #[inline]
    pub fn write_slot(&self, slot: u64, sample: i16) {
        self.storage[self.reduce(slot)].store(sample, Ordering::Relaxed);
    }

    /// Read a raw interleaved slot, reduced modulo [`len`](Self::len)
    #[inline]
    pub fn read_slot(&self, slot: u64) -> i16 {
        self.storage[self.reduce(slot)].load(Ordering::Relaxed)
    }

    /// Copy of the whole buffer in slot order
    pub fn snapshot(&self) -> Vec<i16> {
        self.storage
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .collect()
    }

    /// Total number of sample slots
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Always false; a ring buffer cannot be created empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Size of the buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.storage.len() * std::mem::size_of::<i16>()
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    #[inline]
    fn frame_slot(&self, index: u64, channel_index: usize) -> u64 {
        (self.channel_count as u64)
            .wrapping_mul(index)
            .wrapping_add(channel_index as u64)
    }

    #[inline]
    fn reduce(&self, slot: u64) -> usize {
        (slot % self.storage.len() as u64) as usize
    }
}
