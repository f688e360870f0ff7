//! E2E tests for persistent configuration
//!
//! Tests config round-trip through a file, defaults and validation of
//! device settings.

use simaudio::config::AppConfig;
use simaudio::{DataSource, Device, DeviceConfig, ErrorKind, MonotonicHostClock};
use std::sync::Arc;

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = AppConfig::default();
    config.device.sample_rate = 48000.0;
    config.device.data_source = DataSource::Tone660;
    config.device.zero_timestamp_period = 256;
    config.log_filter = "simaudio=debug".to_string();
    config.save(&path).unwrap();

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded.device, config.device);
    assert_eq!(loaded.log_filter, "simaudio=debug");
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = AppConfig::load_from(&dir.path().join("absent.json"));
    assert_eq!(loaded.device, DeviceConfig::default());
}

#[test]
fn test_loaded_config_builds_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"device": {"sample_rate": 48000.0, "gain_db": -20.0, "data_source": "loopback"}}"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path);
    let device = Device::new(config.device, Arc::new(MonotonicHostClock::new())).unwrap();
    assert_eq!(device.sample_rate(), 48000.0);
    assert_eq!(device.gain_db(), -20.0);
    assert_eq!(device.data_source(), DataSource::Loopback);
}

#[test]
fn test_invalid_device_settings_rejected() {
    for config in [
        DeviceConfig {
            sample_rate: 96000.0,
            ..DeviceConfig::default()
        },
        DeviceConfig {
            gain_db: 6.0,
            ..DeviceConfig::default()
        },
    ] {
        let err = Device::new(config, Arc::new(MonotonicHostClock::new()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
    }
}
