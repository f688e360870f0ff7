//! E2E tests for the device work queue
//!
//! The device runs on its own thread with a real monotonic timer; commands
//! are dispatched synchronously through [`DeviceHandle`].

use simaudio::audio::clock::ClockState;
use simaudio::device::controller::ConfigChangeAction;
use simaudio::{DataSource, Device, DeviceConfig, DeviceHandle, ErrorKind, MonotonicHostClock};
use std::sync::Arc;
use std::time::Duration;

fn spawn(config: DeviceConfig) -> DeviceHandle {
    let device = Device::new(config, Arc::new(MonotonicHostClock::new())).unwrap();
    DeviceHandle::spawn(device).unwrap()
}

#[test]
fn test_timestamps_advance_in_real_time() {
    let handle = spawn(DeviceConfig {
        zero_timestamp_period: 480,
        sample_rate: 48000.0,
        ..DeviceConfig::default()
    });
    handle.start_io().unwrap();

    std::thread::sleep(Duration::from_millis(100));
    let first = handle.status().unwrap().zero_timestamp;
    std::thread::sleep(Duration::from_millis(100));
    let second = handle.status().unwrap().zero_timestamp;

    assert!(second.sample_time > first.sample_time);
    assert!(second.host_time > first.host_time);
    assert_eq!(second.sample_time % 480, 0);
    // 10 ms per buffer
    assert_eq!(
        (second.host_time - first.host_time) / 10_000_000,
        (second.sample_time - first.sample_time) / 480
    );
}

#[test]
fn test_rate_toggle_while_running() {
    let handle = spawn(DeviceConfig::default());
    handle.start_io().unwrap();
    std::thread::sleep(Duration::from_millis(30));

    assert_eq!(handle.test_config_change().unwrap(), 48000.0);
    let status = handle.status().unwrap();
    assert_eq!(status.ticks_per_buffer, 10_666_666);
    assert_eq!(status.clock_state, ClockState::Running);
}

#[test]
fn test_host_rate_change_requires_stopped_io() {
    let handle = spawn(DeviceConfig::default());
    handle.start_io().unwrap();
    let err = handle.change_sample_rate(48000.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    handle.stop_io().unwrap();
    handle.change_sample_rate(48000.0).unwrap();
    assert_eq!(handle.status().unwrap().sample_rate, 48000.0);
}

#[test]
fn test_requested_change_is_committed_in_one_turn() {
    let handle = spawn(DeviceConfig::default());
    let rate = handle
        .request_config_change(ConfigChangeAction::ToggleSampleRate, Some("queued".to_string()))
        .unwrap();
    assert_eq!(rate, 48000.0);

    let status = handle.status().unwrap();
    assert_eq!(status.sample_rate, 48000.0);
    assert!(status.pending_change.is_none());

    // Nothing pending, so a second request is accepted too
    assert_eq!(handle.test_config_change().unwrap(), 44100.0);
}

#[test]
fn test_other_config_action_keeps_rate() {
    let handle = spawn(DeviceConfig::default());
    let rate = handle
        .request_config_change(ConfigChangeAction::Other(7), None)
        .unwrap();
    assert_eq!(rate, 44100.0);
}

#[test]
fn test_cloned_handles_share_device() {
    let handle = spawn(DeviceConfig::default());
    let other = handle.clone();
    other.set_data_source(DataSource::Loopback).unwrap();
    assert_eq!(handle.status().unwrap().data_source, DataSource::Loopback);
    assert_eq!(handle.set_gain_db(-3.0).unwrap(), -3.0);
    assert_eq!(other.status().unwrap().gain_db, -3.0);
}
