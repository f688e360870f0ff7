//! Sine tone generation for the input stream
//!
//! The generator keeps a single monotonic phase counter that is never reset
//! except when the generator is created. Switching frequency mid-stream keeps
//! the counter, so the waveform jumps at the switch point.

use std::f64::consts::PI;

/// Full-scale value of a 16-bit sample
pub const FULL_SCALE: f32 = 0x7FFF as f32;

/// Convert a float sample to 16-bit with a saturating clamp to [-1.0, 1.0]
///
/// # Example
/// ```
/// use simaudio_core::audio::tone::float_to_i16;
///
/// assert_eq!(float_to_i16(2.0), 0x7FFF);
/// assert_eq!(float_to_i16(-2.0), -0x7FFF);
/// assert_eq!(float_to_i16(0.0), 0);
/// ```
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    // NaN maps to silence
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * FULL_SCALE) as i16
}

/// Phase-continuous sine generator
///
/// # Example
/// ```
/// use simaudio_core::audio::tone::ToneGenerator;
///
/// let mut gen = ToneGenerator::new();
/// let samples = gen.generate(440.0, 48000.0, 64, 0.5);
/// assert_eq!(samples.len(), 64);
/// assert_eq!(gen.phase_sample_index(), 64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToneGenerator {
    /// Number of frames synthesized since creation
    phase_sample_index: u64,
}

impl ToneGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit phase index, for replaying a known segment
    pub fn with_phase(phase_sample_index: u64) -> Self {
        Self { phase_sample_index }
    }

    /// Synthesize one frame value and advance the phase
    #[inline]
    pub fn next_sample(&mut self, frequency_hz: f64, sample_rate: f64, volume: f32) -> i16 {
        let phase = 2.0 * PI * frequency_hz * self.phase_sample_index as f64 / sample_rate;
        let value = volume * phase.sin() as f32;
        self.phase_sample_index = self.phase_sample_index.wrapping_add(1);
        float_to_i16(value)
    }

    /// Fill `out` with consecutive samples without allocating
    pub fn generate_into(
        &mut self,
        frequency_hz: f64,
        sample_rate: f64,
        volume: f32,
        out: &mut [i16],
    ) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(frequency_hz, sample_rate, volume);
        }
    }

    /// Synthesize `num_samples` consecutive samples
    pub fn generate(
        &mut self,
        frequency_hz: f64,
        sample_rate: f64,
        num_samples: usize,
        volume: f32,
    ) -> Vec<i16> {
        let mut out = vec![0i16; num_samples];
        self.generate_into(frequency_hz, sample_rate, volume, &mut out);
        out
    }

    /// Current phase index (frames synthesized so far)
    pub fn phase_sample_index(&self) -> u64 {
        self.phase_sample_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_zero_phase() {
        let mut gen = ToneGenerator::new();
        assert_eq!(gen.next_sample(440.0, 44100.0, 1.0), 0);
    }

    #[test]
    fn test_quarter_period_peak() {
        // 1000 Hz at 4000 Hz puts sample 1 at the positive peak
        let mut gen = ToneGenerator::with_phase(1);
        assert_eq!(gen.next_sample(1000.0, 4000.0, 1.0), 0x7FFF);
        // Sample 3 is the negative peak
        let mut gen = ToneGenerator::with_phase(3);
        assert_eq!(gen.next_sample(1000.0, 4000.0, 1.0), -0x7FFF);
    }

    #[test]
    fn test_volume_scales_amplitude() {
        let mut gen = ToneGenerator::new();
        let samples = gen.generate(440.0, 48000.0, 4800, 0.5);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak <= 16384, "peak {} exceeds half scale", peak);
        assert!(peak > 16000, "peak {} too low", peak);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(float_to_i16(1.0), 0x7FFF);
        assert_eq!(float_to_i16(1.5), 0x7FFF);
        assert_eq!(float_to_i16(f32::INFINITY), 0x7FFF);
        assert_eq!(float_to_i16(-1.0), -0x7FFF);
        assert_eq!(float_to_i16(-7.0), -0x7FFF);
        assert_eq!(float_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_overdriven_volume_clips() {
        let mut gen = ToneGenerator::with_phase(1);
        assert_eq!(gen.next_sample(1000.0, 4000.0, 4.0), 0x7FFF);
    }

    #[test]
    fn test_phase_continuous_across_calls() {
        let mut split = ToneGenerator::new();
        let mut first = split.generate(660.0, 44100.0, 100, 0.8);
        first.extend(split.generate(660.0, 44100.0, 37, 0.8));

        let mut whole = ToneGenerator::new();
        assert_eq!(first, whole.generate(660.0, 44100.0, 137, 0.8));
    }

    #[test]
    fn test_frequency_change_keeps_phase_index() {
        let mut gen = ToneGenerator::new();
        gen.generate(440.0, 44100.0, 10, 1.0);
        gen.generate(660.0, 44100.0, 10, 1.0);
        assert_eq!(gen.phase_sample_index(), 20);
    }
}
