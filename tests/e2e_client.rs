//! E2E tests for the user client command surface

use simaudio::audio::clock::Timebase;
use simaudio::{Device, DeviceConfig, DeviceHandle, ErrorKind, ExternalMethod, ManualHostClock, UserClient};
use std::sync::Arc;

fn client() -> (UserClient, DeviceHandle) {
    let clock = Arc::new(ManualHostClock::new(1, Timebase::NANOSECONDS));
    let device = Device::new(DeviceConfig::default(), clock).unwrap();
    let handle = DeviceHandle::spawn(device).unwrap();
    (UserClient::new(handle.clone()), handle)
}

#[test]
fn test_toggle_data_source_cycles() {
    let (mut client, _handle) = client();
    client.call(ExternalMethod::Open).unwrap();
    assert_eq!(
        client.call(ExternalMethod::ToggleDataSource).unwrap(),
        "Data source: Sine Tone 660"
    );
    assert_eq!(
        client.call(ExternalMethod::ToggleDataSource).unwrap(),
        "Data source: Loopback"
    );
    assert_eq!(
        client.call(ExternalMethod::ToggleDataSource).unwrap(),
        "Data source: Sine Tone 440"
    );
}

#[test]
fn test_config_change_updates_device() {
    let (mut client, handle) = client();
    client.call_selector(0).unwrap();
    client.call_selector(3).unwrap();
    assert_eq!(handle.status().unwrap().sample_rate, 48000.0);
    client.call_selector(3).unwrap();
    assert_eq!(handle.status().unwrap().sample_rate, 44100.0);
}

#[test]
fn test_unknown_selector() {
    let (mut client, _handle) = client();
    let err = client.call_selector(42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
}

#[test]
fn test_closed_client_rejects_commands() {
    let (mut client, handle) = client();
    client.call(ExternalMethod::Open).unwrap();
    client.call(ExternalMethod::Close).unwrap();

    let err = client.call(ExternalMethod::TestConfigChange).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(handle.status().unwrap().sample_rate, 44100.0);
}
