//! Simaudio - emulated timer-driven audio device
//!
//! Runs the device on its work queue, drives it from a host I/O loop and
//! accepts interactive commands on stdin.

use anyhow::{Context, Result};
use ringbuf::traits::Consumer;
use simaudio::audio::analyzer::{dominant_frequency, peak_level};
use simaudio::audio::format::supported_formats;
use simaudio::config::AppConfig;
use simaudio::device::controller::InputTap;
use simaudio::host::{HostLoop, HostSettings};
use simaudio::{
    DataSource, Device, DeviceHandle, ExternalMethod, HostClock, MonotonicHostClock, UserClient,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Samples of input kept for frequency analysis
const ANALYSIS_WINDOW: usize = 8192;

/// Monitor loop iterations between status lines
const STATUS_INTERVAL: u32 = 10;

#[derive(Debug, Default)]
struct CliOptions {
    config_path: Option<PathBuf>,
    sample_rate: Option<f64>,
    period: Option<u32>,
    source: Option<DataSource>,
    gain_db: Option<f64>,
}

fn main() -> Result<()> {
    let options = match parse_args(std::env::args().skip(1).collect())? {
        Some(options) => options,
        None => return Ok(()),
    };

    let mut config = match &options.config_path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if let Some(rate) = options.sample_rate {
        config.device.sample_rate = rate;
    }
    if let Some(period) = options.period {
        config.device.zero_timestamp_period = period;
    }
    if let Some(source) = options.source {
        config.device.data_source = source;
    }
    if let Some(gain) = options.gain_db {
        config.device.gain_db = gain;
    }

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("Simaudio v{} ({})", simaudio::VERSION, simaudio::BUILD_DATE);
    println!();

    run(config)
}

/// Parse command line arguments; `None` means the request was fully handled
fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>> {
    let mut options = CliOptions::default();
    let mut i = 0;

    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("{} requires a value", args[i]))
        };
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("simaudio {} ({})", simaudio::VERSION, simaudio::BUILD_DATE);
                return Ok(None);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--formats" | "-f" => {
                list_formats();
                return Ok(None);
            }
            "--config" | "-c" => options.config_path = Some(PathBuf::from(value()?)),
            "--sample-rate" | "-r" => {
                let raw = value()?;
                options.sample_rate = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid sample rate: {}", raw))?,
                );
            }
            "--period" | "-p" => {
                let raw = value()?;
                options.period =
                    Some(raw.parse().with_context(|| format!("Invalid period: {}", raw))?);
            }
            "--source" | "-s" => {
                options.source = Some(value()?.parse().map_err(anyhow::Error::msg)?);
            }
            "--gain" | "-g" => {
                let raw = value()?;
                options.gain_db =
                    Some(raw.parse().with_context(|| format!("Invalid gain: {}", raw))?);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return Ok(None);
            }
        }
        i += 2;
    }

    Ok(Some(options))
}

fn print_help() {
    println!("Usage: simaudio [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH       Load configuration from PATH");
    println!("  -r, --sample-rate RATE  Initial sample rate (44100 or 48000)");
    println!("  -p, --period FRAMES     Frames between zero timestamps");
    println!("  -s, --source SOURCE     Input source: 440, 660 or loopback");
    println!("  -g, --gain DB           Input gain in dB (-96 to 0)");
    println!("  -f, --formats           List supported stream formats");
    println!("  -v, --version           Show version");
    println!("  -h, --help              Show this help");
    println!();
    println!("Commands while running:");
    println!("  toggle   Cycle the input data source");
    println!("  rate     Toggle the sample rate");
    println!("  status   Print the device status");
    println!("  quit     Stop and exit");
}

fn list_formats() {
    println!("Supported stream formats:");
    for format in supported_formats() {
        println!(
            "  {:>6} Hz, {} ch, {}-bit signed integer PCM, {} bytes/frame",
            format.sample_rate,
            format.channels_per_frame,
            format.bits_per_channel,
            format.bytes_per_frame
        );
    }
}

fn run(config: AppConfig) -> Result<()> {
    let clock: Arc<dyn HostClock> = Arc::new(MonotonicHostClock::new());
    let mut device = Device::new(config.device.clone(), Arc::clone(&clock))?;
    let handler = device
        .take_io_handler()
        .context("I/O handler already taken")?;
    let mut tap = device.take_input_tap();

    let handle = DeviceHandle::spawn(device)?;
    handle.start_io()?;
    let host = HostLoop::spawn(handler, HostSettings::default())?;

    let mut client = UserClient::new(handle.clone());
    client.call(ExternalMethod::Open)?;

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    std::thread::Builder::new()
        .name("simaudio-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines().map_while(|l| l.ok()) {
                if line_tx.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
        })?;

    println!("Device running. Type 'help' for commands, Ctrl+C to stop.");
    println!();

    let mut window: Vec<i16> = Vec::with_capacity(ANALYSIS_WINDOW * 2);
    let mut last_status = String::new();
    let mut iteration = 0u32;

    while running.load(Ordering::SeqCst) {
        while let Ok(line) = line_rx.try_recv() {
            let reply = match line.as_str() {
                "" => continue,
                "toggle" | "t" => client.call(ExternalMethod::ToggleDataSource),
                "rate" | "r" => client.call(ExternalMethod::TestConfigChange),
                "status" | "s" => {
                    let status = handle.status()?;
                    println!("{}", serde_json::to_string_pretty(&status)?);
                    continue;
                }
                "quit" | "q" | "exit" => {
                    running.store(false, Ordering::SeqCst);
                    continue;
                }
                _ => {
                    print_help();
                    continue;
                }
            };
            match reply {
                Ok(message) => {
                    println!("{}", message);
                    window.clear();
                }
                Err(e) => warn!(error = %e, command = %line, "Command failed"),
            }
        }

        if let Some(tap) = tap.as_mut() {
            drain_tap(tap, &mut window);
        }

        iteration += 1;
        if iteration % STATUS_INTERVAL == 0 {
            let status = handle.status()?;
            let frequency = dominant_frequency(&window, status.sample_rate)
                .map(|f| format!("{:>7.1} Hz", f))
                .unwrap_or_else(|| "      - Hz".to_string());

            let status_line = format!(
                "Source: {:<13} | Rate: {:>5} Hz | Gain: {:>5.1} dB | ZTS: {:>10} | Input: {} | Peak: {:>5}",
                status.data_source.name(),
                status.sample_rate,
                status.gain_db,
                status.zero_timestamp.sample_time,
                frequency,
                peak_level(&window),
            );

            // Only print if changed (reduce spam)
            if status_line != last_status {
                println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), status_line);
                last_status = status_line;
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    let _ = client.call(ExternalMethod::Close);
    let cycles = host.cycles();
    drop(host.stop());
    if let Err(e) = handle.stop_io() {
        error!(error = %e, "Failed to stop I/O");
    }
    info!(cycles, "Host I/O cycles completed");
    println!("Done.");

    Ok(())
}

/// Move everything queued on the tap into the analysis window
fn drain_tap(tap: &mut InputTap, window: &mut Vec<i16>) {
    window.extend(tap.pop_iter());
    if window.len() > ANALYSIS_WINDOW {
        let excess = window.len() - ANALYSIS_WINDOW;
        window.drain(..excess);
    }
}
