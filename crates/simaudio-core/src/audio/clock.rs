//! Zero-timestamp clock
//!
//! A timer-driven state machine that anchors the device's sample clock to the
//! host clock. Every firing publishes a new (sample_time, host_time) pair one
//! buffer period after the previous one and schedules the next firing.
//!
//! ```text
//!            start()              fire(t)
//! Stopped ───────────▶ Armed ───────────▶ Running ──┐ fire(t)
//!    ▲                   │                  ▲  │    │
//!    └──── stop() ───────┴──── stop() ──────┼──┘◀───┘
//! ```

use serde::Serialize;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::time::Instant;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Ratio converting host clock ticks to nanoseconds: `ns = ticks * numer / denom`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timebase {
    pub numer: u32,
    pub denom: u32,
}

impl Timebase {
    /// One tick per nanosecond
    pub const NANOSECONDS: Timebase = Timebase { numer: 1, denom: 1 };

    pub fn ticks_to_nanos(&self, ticks: u64) -> u64 {
        (ticks as u128 * self.numer as u128 / self.denom as u128) as u64
    }
}

/// Source of absolute host time
pub trait HostClock: Send + Sync {
    /// Current host time in ticks
    fn now(&self) -> u64;

    /// Tick-to-nanosecond ratio of [`now`](HostClock::now)
    fn timebase(&self) -> Timebase;
}

/// Monotonic host clock counting nanoseconds since creation
///
/// Starts at one tick so a real reading is never mistaken for the
/// uninitialized timestamp sentinel.
#[derive(Debug, Clone)]
pub struct MonotonicHostClock {
    epoch: Instant,
}

impl MonotonicHostClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for MonotonicHostClock {
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64 + 1
    }

    fn timebase(&self) -> Timebase {
        Timebase::NANOSECONDS
    }
}

/// Manually advanced host clock for simulation and deterministic tests
#[derive(Debug)]
pub struct ManualHostClock {
    ticks: AtomicU64,
    timebase: Timebase,
}

impl ManualHostClock {
    pub fn new(start: u64, timebase: Timebase) -> Self {
        Self {
            ticks: AtomicU64::new(start),
            timebase,
        }
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) -> u64 {
        self.ticks.fetch_add(ticks, Ordering::SeqCst) + ticks
    }
}

impl HostClock for ManualHostClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn timebase(&self) -> Timebase {
        self.timebase
    }
}

/// Anchor pair of device sample time and host time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ZeroTimestamp {
    pub sample_time: u64,
    pub host_time: u64,
}

impl ZeroTimestamp {
    /// The "no timestamp yet" sentinel
    pub const UNINITIALIZED: ZeroTimestamp = ZeroTimestamp {
        sample_time: 0,
        host_time: 0,
    };

    pub fn is_initialized(&self) -> bool {
        self.host_time != 0
    }
}

/// Clock state as seen from the real-time I/O thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockSnapshot {
    /// Incremented on every start; a change means the timeline restarted
    pub epoch: u64,
    pub zero_timestamp: ZeroTimestamp,
    pub ticks_per_buffer: u64,
    pub period: u32,
}

impl ClockSnapshot {
    /// Host time at which `sample_time` is due on this timeline
    ///
    /// Sample times before the zero timestamp map to its host time.
    pub fn host_time_at(&self, sample_time: u64) -> u64 {
        if self.period == 0 {
            return self.zero_timestamp.host_time;
        }
        let frames = sample_time.saturating_sub(self.zero_timestamp.sample_time) as u128;
        let ticks = frames * self.ticks_per_buffer as u128 / self.period as u128;
        self.zero_timestamp.host_time.saturating_add(ticks as u64)
    }
}

/// Single-writer publication of [`ClockSnapshot`]s
///
/// The work queue stores, the I/O thread loads. Readers never block; a load
/// that overlaps a store retries until it sees a consistent copy.
#[derive(Debug, Default)]
pub struct PublishedClock {
    /// Odd while a store is in progress
    sequence: AtomicU64,
    epoch: AtomicU64,
    sample_time: AtomicU64,
    host_time: AtomicU64,
    ticks_per_buffer: AtomicU64,
    period: AtomicU64,
}

impl PublishedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a snapshot; must only be called from one thread at a time
    pub fn store(&self, snapshot: ClockSnapshot) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.epoch.store(snapshot.epoch, Ordering::Relaxed);
        self.sample_time
            .store(snapshot.zero_timestamp.sample_time, Ordering::Relaxed);
        self.host_time
            .store(snapshot.zero_timestamp.host_time, Ordering::Relaxed);
        self.ticks_per_buffer
            .store(snapshot.ticks_per_buffer, Ordering::Relaxed);
        self.period.store(snapshot.period as u64, Ordering::Relaxed);

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    pub fn load(&self) -> ClockSnapshot {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let snapshot = ClockSnapshot {
                epoch: self.epoch.load(Ordering::Relaxed),
                zero_timestamp: ZeroTimestamp {
                    sample_time: self.sample_time.load(Ordering::Relaxed),
                    host_time: self.host_time.load(Ordering::Relaxed),
                },
                ticks_per_buffer: self.ticks_per_buffer.load(Ordering::Relaxed),
                period: self.period.load(Ordering::Relaxed) as u32,
            };

            fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return snapshot;
            }
        }
    }
}

/// Zero-timestamp clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockState {
    /// Timer disabled
    Stopped,
    /// Timer scheduled, no timestamp emitted yet
    Armed,
    /// Timestamps flowing
    Running,
}

/// Host ticks spanning `period` frames at `sample_rate`
///
/// # Example
/// ```
/// use simaudio_core::audio::clock::{ticks_per_buffer, Timebase};
///
/// // 512 frames at 48 kHz is 10.666.. ms
/// assert_eq!(ticks_per_buffer(512, 48000.0, Timebase::NANOSECONDS), 10_666_666);
/// // A 125/3 timebase (41.67 ns per tick)
/// assert_eq!(ticks_per_buffer(480, 48000.0, Timebase { numer: 125, denom: 3 }), 240_000);
/// ```
pub fn ticks_per_buffer(period: u32, sample_rate: f64, timebase: Timebase) -> u64 {
    let nanos = period as f64 * NANOS_PER_SEC / sample_rate;
    (nanos * timebase.denom as f64 / timebase.numer as f64) as u64
}

/// Timer-driven zero-timestamp state machine
///
/// Runs only on the device work queue; firings are serialized by the queue.
#[derive(Debug)]
pub struct ZeroTimestampClock {
    state: ClockState,
    /// Frames between timestamps
    period: u32,
    sample_rate: f64,
    timebase: Timebase,
    ticks_per_buffer: u64,
    current: ZeroTimestamp,
    /// Host time of the last `start`
    armed_at: u64,
    /// Absolute host time of the next firing while the timer is enabled
    next_deadline: Option<u64>,
}

impl ZeroTimestampClock {
    pub fn new(period: u32, sample_rate: f64, timebase: Timebase) -> Self {
        Self {
            state: ClockState::Stopped,
            period,
            sample_rate,
            timebase,
            ticks_per_buffer: ticks_per_buffer(period, sample_rate, timebase),
            current: ZeroTimestamp::UNINITIALIZED,
            armed_at: 0,
            next_deadline: None,
        }
    }

    /// Reset the timestamp and schedule the first firing one buffer from `now`
    ///
    /// Returns the deadline of the first firing.
    pub fn start(&mut self, now: u64) -> u64 {
        self.recompute_ticks_per_buffer(self.sample_rate);
        self.current = ZeroTimestamp::UNINITIALIZED;
        self.armed_at = now;
        let deadline = now.saturating_add(self.ticks_per_buffer);
        self.next_deadline = Some(deadline);
        self.state = ClockState::Armed;
        deadline
    }

    /// Handle a timer firing at absolute host time `now`
    ///
    /// Returns the emitted timestamp, or `None` if the timer is disabled.
    pub fn fire(&mut self, now: u64) -> Option<ZeroTimestamp> {
        if self.state == ClockState::Stopped {
            return None;
        }

        self.current = if self.current.is_initialized() {
            ZeroTimestamp {
                sample_time: self.current.sample_time + self.period as u64,
                host_time: self.current.host_time + self.ticks_per_buffer,
            }
        } else {
            ZeroTimestamp {
                sample_time: 0,
                host_time: now,
            }
        };

        self.state = ClockState::Running;
        self.next_deadline = Some(self.current.host_time.saturating_add(self.ticks_per_buffer));
        Some(self.current)
    }

    /// Disable the timer; the last timestamp is kept
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.next_deadline = None;
    }

    /// Refresh the cadence for a new sample rate
    ///
    /// Must run on every rate change. A pending deadline is rescheduled so it
    /// follows the new cadence: from the arm time before the first firing,
    /// from the current timestamp after it.
    pub fn recompute_ticks_per_buffer(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.ticks_per_buffer = ticks_per_buffer(self.period, sample_rate, self.timebase);
        let anchor = match self.state {
            ClockState::Stopped => return,
            ClockState::Armed => self.armed_at,
            ClockState::Running => self.current.host_time,
        };
        self.next_deadline = Some(anchor.saturating_add(self.ticks_per_buffer));
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != ClockState::Stopped
    }

    pub fn current(&self) -> ZeroTimestamp {
        self.current
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.next_deadline
    }

    pub fn ticks_per_buffer(&self) -> u64 {
        self.ticks_per_buffer
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn timebase(&self) -> Timebase {
        self.timebase
    }
}
