//! Input signal analysis
//!
//! Estimates the dominant frequency of captured input samples, used to check
//! which data source the device is producing.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Smallest window the estimator will analyze
pub const MIN_WINDOW: usize = 256;

/// Estimate the dominant frequency of `samples` in Hz
///
/// Uses the largest power-of-two window that fits, a Hann taper and
/// parabolic interpolation around the peak bin. Returns `None` for windows
/// shorter than [`MIN_WINDOW`] or for silence.
///
/// # Example
/// ```
/// use simaudio_core::audio::analyzer::dominant_frequency;
/// use simaudio_core::audio::tone::ToneGenerator;
///
/// let samples = ToneGenerator::new().generate(440.0, 48000.0, 8192, 0.5);
/// let freq = dominant_frequency(&samples, 48000.0).unwrap();
/// assert!((freq - 440.0).abs() < 2.0);
/// ```
pub fn dominant_frequency(samples: &[i16], sample_rate: f64) -> Option<f64> {
    if samples.len() < MIN_WINDOW {
        return None;
    }
    let size = 1usize << (usize::BITS - 1 - samples.len().leading_zeros());
    let window = &samples[samples.len() - size..];

    let mut buffer: Vec<Complex<f64>> = window
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let hann = 0.5 - 0.5 * (2.0 * PI * i as f64 / (size - 1) as f64).cos();
            Complex::new(s as f64 / 32768.0 * hann, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    fft.process(&mut buffer);

    let magnitudes: Vec<f64> = buffer[..size / 2].iter().map(|c| c.norm()).collect();
    let (peak, &peak_mag) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak_mag < 1e-6 {
        return None;
    }

    let offset = if peak + 1 < magnitudes.len() {
        let (l, c, r) = (magnitudes[peak - 1], peak_mag, magnitudes[peak + 1]);
        let denom = l - 2.0 * c + r;
        if denom.abs() > f64::EPSILON {
            0.5 * (l - r) / denom
        } else {
            0.0
        }
    } else {
        0.0
    };

    Some((peak as f64 + offset) * sample_rate / size as f64)
}

/// Peak absolute sample value
pub fn peak_level(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}
