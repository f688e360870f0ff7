//! E2E tests for the input signal path
//!
//! Exercises tone synthesis and loopback through the device's registered
//! I/O handler, the way a host would.

use approx::assert_abs_diff_eq;
use simaudio::audio::analyzer::{dominant_frequency, peak_level};
use simaudio::audio::clock::Timebase;
use simaudio::audio::tone::{float_to_i16, ToneGenerator};
use simaudio::{DataSource, Device, DeviceConfig, IoHandler, IoOperation, ManualHostClock};
use std::sync::Arc;

fn running_device(config: DeviceConfig) -> (Device, IoHandler) {
    let clock = Arc::new(ManualHostClock::new(1, Timebase::NANOSECONDS));
    let mut device = Device::new(config, clock).unwrap();
    let handler = device.take_io_handler().unwrap();
    device.start_io().unwrap();
    (device, handler)
}

/// Run BeginRead cycles and collect the input they produce
fn capture(handler: &mut IoHandler, cycles: u64, frame_size: u32) -> Vec<i16> {
    let mut captured = Vec::new();
    let mut chunk = vec![0i16; frame_size as usize];
    for cycle in 0..cycles {
        let sample_time = cycle * frame_size as u64;
        handler
            .io_operation(IoOperation::BeginRead, frame_size, sample_time, 1)
            .unwrap();
        handler.read_input(sample_time, &mut chunk).unwrap();
        captured.extend_from_slice(&chunk);
    }
    captured
}

#[test]
fn test_tone_generator_is_deterministic() {
    let a = ToneGenerator::new().generate(440.0, 44100.0, 1000, 0.5);
    let b = ToneGenerator::new().generate(440.0, 44100.0, 1000, 0.5);
    assert_eq!(a, b);
}

#[test]
fn test_tone_phase_is_continuous() {
    let whole = ToneGenerator::new().generate(660.0, 48000.0, 700, 0.8);

    let mut split = ToneGenerator::new();
    let mut parts = split.generate(660.0, 48000.0, 300, 0.8);
    parts.extend(split.generate(660.0, 48000.0, 400, 0.8));

    assert_eq!(parts, whole);
    assert_eq!(split.phase_sample_index(), 700);
}

#[test]
fn test_saturation() {
    assert_eq!(float_to_i16(1.0), 0x7FFF);
    assert_eq!(float_to_i16(3.5), 0x7FFF);
    assert_eq!(float_to_i16(-1.0), -0x7FFF);
    assert_eq!(float_to_i16(-3.5), -0x7FFF);
    assert_eq!(float_to_i16(0.0), 0);
}

#[test]
fn test_tone_frequencies_reach_input() {
    for (source, expected) in [(DataSource::Tone440, 440.0), (DataSource::Tone660, 660.0)] {
        let config = DeviceConfig {
            data_source: source,
            ..DeviceConfig::default()
        };
        let (_device, mut handler) = running_device(config);
        // One cycle per ring lap so every frame is read back before overwrite
        let captured = capture(&mut handler, 32, 512);

        let frequency = dominant_frequency(&captured, 44100.0).unwrap();
        assert_abs_diff_eq!(frequency, expected, epsilon = 3.0);
    }
}

#[test]
fn test_gain_scales_tone() {
    let config = DeviceConfig {
        gain_db: -6.0,
        ..DeviceConfig::default()
    };
    let (_device, mut handler) = running_device(config);
    let captured = capture(&mut handler, 8, 512);

    let expected_peak = 10f64.powf(-6.0 / 20.0) * 32767.0;
    assert_abs_diff_eq!(peak_level(&captured) as f64, expected_peak, epsilon = 40.0);
}

#[test]
fn test_loopback_round_trip_at_unity_gain() {
    let config = DeviceConfig {
        data_source: DataSource::Loopback,
        gain_db: 0.0,
        ..DeviceConfig::default()
    };
    let (_device, mut handler) = running_device(config);
    let len = handler.output_len() as u64;
    assert_eq!(len, 512);

    let pattern: Vec<i16> = (0..64).map(|i| (i * 517 % 4096) as i16 - 2048).collect();
    // Sample time past the end of the ring so the write wraps
    let sample_time = 3 * len + 480;
    handler.write_output(sample_time, &pattern).unwrap();
    handler
        .io_operation(IoOperation::WriteEnd, 64, sample_time, 1)
        .unwrap();
    handler
        .io_operation(IoOperation::BeginRead, 64, sample_time, 1)
        .unwrap();

    let mut input = vec![0i16; 64];
    handler.read_input(sample_time, &mut input).unwrap();
    assert_eq!(input, pattern);

    // Wrapped half landed at the start of the ring
    let mut head = vec![0i16; 32];
    handler.read_input(0, &mut head).unwrap();
    assert_eq!(head, pattern[32..]);
}

#[test]
fn test_source_toggle_applies_on_next_cycle() {
    let (mut device, mut handler) = running_device(DeviceConfig {
        gain_db: 0.0,
        ..DeviceConfig::default()
    });
    capture(&mut handler, 1, 512);

    device.toggle_data_source();
    device.toggle_data_source();
    handler.write_output(512, &[1234; 512]).unwrap();
    let captured = {
        handler
            .io_operation(IoOperation::BeginRead, 512, 512, 1)
            .unwrap();
        let mut input = vec![0i16; 512];
        handler.read_input(512, &mut input).unwrap();
        input
    };
    assert!(captured.iter().all(|&s| s == 1234));
}

#[test]
fn test_unmapped_cycle_fails_without_writing() {
    let clock = Arc::new(ManualHostClock::new(1, Timebase::NANOSECONDS));
    let mut device = Device::new(DeviceConfig::default(), clock).unwrap();
    let mut handler = device.take_io_handler().unwrap();

    assert!(handler
        .io_operation(IoOperation::BeginRead, 512, 0, 1)
        .is_err());
    assert_eq!(handler.tone_phase(), 0);
}
