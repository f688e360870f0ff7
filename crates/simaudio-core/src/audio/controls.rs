//! Input data-source selector and input gain controls
//!
//! Both controls are written only from the device work queue and read
//! without locks from the real-time I/O handler. A change may be observed up
//! to one I/O cycle late.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Default input gain in dB
pub const DEFAULT_GAIN_DB: f64 = -6.0;

/// Input gain control range in dB
pub const GAIN_RANGE_DB: (f64, f64) = (-96.0, 0.0);

/// Source of the input stream's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Sine tone at 440 Hz
    Tone440,
    /// Sine tone at 660 Hz
    Tone660,
    /// Copy of the output stream
    Loopback,
}

struct DataSourceInfo {
    value: u32,
    name: &'static str,
}

const DATA_SOURCE_INFO: [DataSourceInfo; 3] = [
    DataSourceInfo {
        value: 440,
        name: "Sine Tone 440",
    },
    DataSourceInfo {
        value: 660,
        name: "Sine Tone 660",
    },
    DataSourceInfo {
        value: 0,
        name: "Loopback",
    },
];

impl DataSource {
    /// Selector entries in toggle order
    pub const ALL: [DataSource; 3] = [DataSource::Tone440, DataSource::Tone660, DataSource::Loopback];

    fn info(self) -> &'static DataSourceInfo {
        &DATA_SOURCE_INFO[self as usize]
    }

    /// Selector tag: tone frequency in Hz, or 0 for loopback
    pub fn value(self) -> u32 {
        self.info().value
    }

    /// Display name shown to the host
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Tone frequency, `None` for loopback
    pub fn frequency(self) -> Option<f64> {
        match self {
            DataSource::Loopback => None,
            tone => Some(tone.value() as f64),
        }
    }

    /// Next entry in the fixed toggle cycle
    pub fn next(self) -> DataSource {
        match self {
            DataSource::Tone440 => DataSource::Tone660,
            DataSource::Tone660 => DataSource::Loopback,
            DataSource::Loopback => DataSource::Tone440,
        }
    }

    /// Look up an entry by its selector tag
    pub fn from_value(value: u32) -> Option<DataSource> {
        Self::ALL.into_iter().find(|s| s.value() == value)
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "440" | "tone440" => Ok(DataSource::Tone440),
            "660" | "tone660" => Ok(DataSource::Tone660),
            "0" | "loopback" => Ok(DataSource::Loopback),
            other => Err(format!("unknown data source: {}", other)),
        }
    }
}

/// Host-visible selector holding exactly one current [`DataSource`]
#[derive(Debug)]
pub struct SelectorControl {
    /// Selector tag of the current entry
    current: AtomicU32,
}

impl SelectorControl {
    pub fn new(initial: DataSource) -> Self {
        Self {
            current: AtomicU32::new(initial.value()),
        }
    }

    /// Current selection
    #[inline]
    pub fn current(&self) -> DataSource {
        DataSource::from_value(self.current.load(Ordering::Acquire)).unwrap_or(DataSource::Tone440)
    }

    pub fn set(&self, source: DataSource) {
        self.current.store(source.value(), Ordering::Release);
    }

    /// Advance to the next entry and return it
    pub fn toggle(&self) -> DataSource {
        let next = self.current().next();
        self.set(next);
        next
    }
}

/// Input level control in decibels
#[derive(Debug)]
pub struct GainControl {
    /// Current value in dB, stored as f64 bits
    current_db: AtomicU64,
    min_db: f64,
    max_db: f64,
}

impl GainControl {
    /// Create a control; the initial value is clamped into range
    pub fn new(initial_db: f64, range: (f64, f64)) -> Self {
        let (min_db, max_db) = range;
        let control = Self {
            current_db: AtomicU64::new(min_db.to_bits()),
            min_db,
            max_db,
        };
        control.set_db(initial_db);
        control
    }

    /// Set the gain, clamped to the control range; returns the applied value
    ///
    /// A NaN request leaves the current value in place.
    pub fn set_db(&self, db: f64) -> f64 {
        if db.is_nan() {
            return self.db();
        }
        let db = db.clamp(self.min_db, self.max_db);
        self.current_db.store(db.to_bits(), Ordering::Release);
        db
    }

    pub fn db(&self) -> f64 {
        f64::from_bits(self.current_db.load(Ordering::Acquire))
    }

    /// Linear gain `10^(db/20)`, computed at read time
    #[inline]
    pub fn scalar(&self) -> f32 {
        10f64.powf(self.db() / 20.0) as f32
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min_db, self.max_db)
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN_DB, GAIN_RANGE_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_data_source_metadata() {
        assert_eq!(DataSource::Tone440.value(), 440);
        assert_eq!(DataSource::Tone660.value(), 660);
        assert_eq!(DataSource::Loopback.value(), 0);
        assert_eq!(DataSource::Loopback.name(), "Loopback");
        assert_eq!(DataSource::Tone440.frequency(), Some(440.0));
        assert_eq!(DataSource::Loopback.frequency(), None);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(DataSource::from_value(660), Some(DataSource::Tone660));
        assert_eq!(DataSource::from_value(0), Some(DataSource::Loopback));
        assert_eq!(DataSource::from_value(1000), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("loopback".parse::<DataSource>(), Ok(DataSource::Loopback));
        assert_eq!("440".parse::<DataSource>(), Ok(DataSource::Tone440));
        assert!("880".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_selector_cycle() {
        let selector = SelectorControl::new(DataSource::Tone440);
        assert_eq!(selector.toggle(), DataSource::Tone660);
        assert_eq!(selector.toggle(), DataSource::Loopback);
        assert_eq!(selector.toggle(), DataSource::Tone440);
        assert_eq!(selector.current(), DataSource::Tone440);
    }

    #[test]
    fn test_gain_default() {
        let gain = GainControl::default();
        assert_eq!(gain.db(), -6.0);
        assert_relative_eq!(gain.scalar(), 0.501187, epsilon = 1e-5);
    }

    #[test]
    fn test_gain_zero_db_is_unity() {
        let gain = GainControl::new(0.0, GAIN_RANGE_DB);
        assert_eq!(gain.scalar(), 1.0);
    }

    #[test]
    fn test_gain_clamped() {
        let gain = GainControl::default();
        assert_eq!(gain.set_db(12.0), 0.0);
        assert_eq!(gain.set_db(-200.0), -96.0);
    }

    #[test]
    fn test_gain_nan_keeps_current() {
        let gain = GainControl::default();
        assert_eq!(gain.set_db(f64::NAN), -6.0);
        assert_eq!(gain.db(), -6.0);

        let gain = GainControl::new(f64::NAN, GAIN_RANGE_DB);
        assert_eq!(gain.db(), -96.0);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DataSource::Tone660).unwrap();
        assert_eq!(json, "\"tone660\"");
    }
}
