//! Device work queue
//!
//! The device lives on a dedicated thread that runs a single-threaded tokio
//! runtime. Commands arrive over an mpsc channel and are executed one at a
//! time, interleaved with zero-timestamp timer firings, so reconfiguration
//! never overlaps a firing. [`DeviceHandle`] methods block the caller until
//! the command has run, mirroring a synchronous dispatch onto the queue.
//!
//! Handle methods must not be called from inside an async runtime.

use crate::audio::controls::DataSource;
use crate::device::controller::{ConfigChangeAction, Device, DeviceStatus};
use crate::error::{DeviceError, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Commands sent to the work queue thread
enum DeviceCommand {
    StartIo {
        reply: oneshot::Sender<Result<()>>,
    },
    StopIo {
        reply: oneshot::Sender<Result<()>>,
    },
    ToggleDataSource {
        reply: oneshot::Sender<DataSource>,
    },
    SetDataSource {
        source: DataSource,
        reply: oneshot::Sender<()>,
    },
    SetGain {
        db: f64,
        reply: oneshot::Sender<f64>,
    },
    RequestConfigChange {
        action: ConfigChangeAction,
        info: Option<String>,
        reply: oneshot::Sender<Result<f64>>,
    },
    ChangeSampleRate {
        rate: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    GetStatus {
        reply: oneshot::Sender<DeviceStatus>,
    },
}

/// Handle to the device work queue
#[derive(Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<DeviceCommand>,
}

impl DeviceHandle {
    /// Move `device` onto a new work queue thread and return a handle
    ///
    /// The queue stops, and I/O with it, once every handle is dropped.
    pub fn spawn(device: Device) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to build work queue runtime");
                DeviceError::ResourceExhaustion {
                    what: "work queue runtime",
                }
            })?;

        let (tx, rx) = mpsc::channel::<DeviceCommand>(32);
        std::thread::Builder::new()
            .name("simaudio-work-queue".to_string())
            .spawn(move || runtime.block_on(run_queue(device, rx)))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to spawn work queue thread");
                DeviceError::ResourceExhaustion {
                    what: "work queue thread",
                }
            })?;

        Ok(Self { tx })
    }

    fn dispatch_sync<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> DeviceCommand) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(make(reply))
            .map_err(|_| DeviceError::WorkQueueClosed)?;
        rx.blocking_recv().map_err(|_| DeviceError::WorkQueueClosed)
    }

    pub fn start_io(&self) -> Result<()> {
        self.dispatch_sync(|reply| DeviceCommand::StartIo { reply })?
    }

    pub fn stop_io(&self) -> Result<()> {
        self.dispatch_sync(|reply| DeviceCommand::StopIo { reply })?
    }

    pub fn toggle_data_source(&self) -> Result<DataSource> {
        self.dispatch_sync(|reply| DeviceCommand::ToggleDataSource { reply })
    }

    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        self.dispatch_sync(|reply| DeviceCommand::SetDataSource { source, reply })
    }

    /// Set the input gain; returns the applied value
    pub fn set_gain_db(&self, db: f64) -> Result<f64> {
        self.dispatch_sync(|reply| DeviceCommand::SetGain { db, reply })
    }

    /// Request a configuration change which the queue commits immediately
    ///
    /// The queue plays the host's part and always agrees, so the request and
    /// the commit run back to back in one queue turn and nothing is left
    /// pending. The abort path of the protocol is therefore not reachable
    /// through a handle; callers that need to veto a change drive
    /// [`Device::request_config_change`] and [`Device::abort_config_change`]
    /// directly before handing the device to a queue.
    ///
    /// Returns the sample rate after the change.
    pub fn request_config_change(
        &self,
        action: ConfigChangeAction,
        info: Option<String>,
    ) -> Result<f64> {
        self.dispatch_sync(|reply| DeviceCommand::RequestConfigChange {
            action,
            info,
            reply,
        })?
    }

    /// Toggle the sample rate through the configuration change protocol
    pub fn test_config_change(&self) -> Result<f64> {
        self.request_config_change(
            ConfigChangeAction::ToggleSampleRate,
            Some("sample rate toggle requested by client".to_string()),
        )
    }

    /// Host-initiated rate change (I/O must be stopped)
    pub fn change_sample_rate(&self, rate: f64) -> Result<()> {
        self.dispatch_sync(|reply| DeviceCommand::ChangeSampleRate { rate, reply })?
    }

    pub fn status(&self) -> Result<DeviceStatus> {
        self.dispatch_sync(|reply| DeviceCommand::GetStatus { reply })
    }
}

async fn run_queue(mut device: Device, mut rx: mpsc::Receiver<DeviceCommand>) {
    tracing::debug!("Work queue started");

    loop {
        let timer = device.timer_deadline().map(|deadline| {
            let clock = device.host_clock();
            let remaining = deadline.saturating_sub(clock.now());
            tokio::time::sleep(Duration::from_nanos(
                clock.timebase().ticks_to_nanos(remaining),
            ))
        });

        tokio::select! {
            biased;
            command = rx.recv() => match command {
                Some(command) => handle_command(&mut device, command),
                None => break,
            },
            _ = async {
                match timer {
                    Some(sleep) => sleep.await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                let now = device.host_clock().now();
                device.on_timer(now);
            }
        }
    }

    if device.is_io_running() {
        let _ = device.stop_io();
    }
    tracing::debug!("Work queue stopped");
}

fn handle_command(device: &mut Device, command: DeviceCommand) {
    match command {
        DeviceCommand::StartIo { reply } => {
            let _ = reply.send(device.start_io());
        }
        DeviceCommand::StopIo { reply } => {
            let _ = reply.send(device.stop_io());
        }
        DeviceCommand::ToggleDataSource { reply } => {
            let _ = reply.send(device.toggle_data_source());
        }
        DeviceCommand::SetDataSource { source, reply } => {
            device.set_data_source(source);
            let _ = reply.send(());
        }
        DeviceCommand::SetGain { db, reply } => {
            let _ = reply.send(device.set_gain_db(db));
        }
        DeviceCommand::RequestConfigChange {
            action,
            info,
            reply,
        } => {
            let result = device
                .request_config_change(action, info.clone())
                .and_then(|_| device.perform_config_change(action, info.as_deref()))
                .map(|_| device.sample_rate());
            let _ = reply.send(result);
        }
        DeviceCommand::ChangeSampleRate { rate, reply } => {
            let _ = reply.send(device.handle_change_sample_rate(rate));
        }
        DeviceCommand::GetStatus { reply } => {
            let _ = reply.send(device.status());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::{ClockState, ManualHostClock, MonotonicHostClock, Timebase};
    use crate::config::DeviceConfig;
    use std::sync::Arc;

    fn spawn_manual() -> DeviceHandle {
        let clock = Arc::new(ManualHostClock::new(1, Timebase::NANOSECONDS));
        let device = Device::new(DeviceConfig::default(), clock).unwrap();
        DeviceHandle::spawn(device).unwrap()
    }

    #[test]
    fn test_commands_round_trip() {
        let handle = spawn_manual();
        assert_eq!(handle.toggle_data_source().unwrap(), DataSource::Tone660);
        assert_eq!(handle.set_gain_db(-20.0).unwrap(), -20.0);
        assert_eq!(handle.test_config_change().unwrap(), 48000.0);
        assert_eq!(handle.test_config_change().unwrap(), 44100.0);

        let status = handle.status().unwrap();
        assert_eq!(status.data_source, DataSource::Tone660);
        assert_eq!(status.gain_db, -20.0);
        assert!(status.pending_change.is_none());
    }

    #[test]
    fn test_stop_without_start() {
        let handle = spawn_manual();
        assert!(handle.stop_io().is_err());
    }

    #[test]
    fn test_timer_runs_on_queue() {
        let config = DeviceConfig {
            zero_timestamp_period: 256,
            sample_rate: 48000.0,
            ..DeviceConfig::default()
        };
        let device = Device::new(config, Arc::new(MonotonicHostClock::new())).unwrap();
        let handle = DeviceHandle::spawn(device).unwrap();

        handle.start_io().unwrap();
        std::thread::sleep(Duration::from_millis(120));
        let status = handle.status().unwrap();
        assert_eq!(status.clock_state, ClockState::Running);
        assert!(status.zero_timestamp.is_initialized());
        assert!(status.zero_timestamp.sample_time >= 256);
        assert_eq!(status.zero_timestamp.sample_time % 256, 0);

        handle.stop_io().unwrap();
        let stopped = handle.status().unwrap().zero_timestamp;
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.status().unwrap().zero_timestamp, stopped);
    }
}
