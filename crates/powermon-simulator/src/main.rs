//! Desktop simulator for the powermon dashboard core.
//!
//! Runs the polling driver at frame rate against [`SyntheticService`], an
//! in-process imitation of the acquisition services, and logs a summary of
//! every subscription once per second.
//!
//! # Usage
//!
//! ```text
//! powermon-simulator [config.json]
//! ```
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `RUST_LOG` | log filter, e.g. `info` or `powermon_core=debug` |
//! | `POWERMON_RUN_SECS` | stop after this many seconds (0 or unset: run forever) |
//!
//! Both may also be set in a `.env` file.

mod synthetic;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{error, info, warn};

use powermon_core::acquisition::{Acquisition, Decoder, UsagePeriod};
use powermon_core::config::DashboardConfig;
use powermon_core::driver::PollingDriver;
use powermon_core::stats::{DisplayWindow, WindowStats};
use powermon_core::subscription::Subscription;
use powermon_core::time::{EpochNanos, nanos_to_secs};
use powermon_core::transport::ResponseChannel;

use crate::synthetic::SyntheticService;

/// Target frame duration (~25 FPS)
const FRAME_DURATION: Duration = Duration::from_millis(40);

/// Interval between summary log lines
const SUMMARY_INTERVAL: Duration = Duration::from_secs(1);

static RESPONSES: ResponseChannel = ResponseChannel::new();

fn epoch_nanos() -> EpochNanos {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as EpochNanos
}

fn load_config() -> Option<DashboardConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("No config file given, using the NILM dashboard defaults");
        return Some(DashboardConfig::default());
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Cannot read {}: {}", path, e);
            return None;
        }
    };

    match DashboardConfig::from_json(&bytes) {
        Ok(config) => {
            info!("Loaded {} subscriptions from {}", config.subscriptions.len(), path);
            Some(config)
        }
        Err(e) => {
            error!("Invalid config {}: {}", path, e);
            None
        }
    }
}

fn run_limit() -> Option<Duration> {
    let value = std::env::var("POWERMON_RUN_SECS").ok()?;
    match value.parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!("Ignoring POWERMON_RUN_SECS={:?}", value);
            None
        }
    }
}

/// One log line per subscription, like the dashboard's plot legends
fn log_summary(subscription: &Subscription, config: &DashboardConfig, now: EpochNanos) {
    let id = subscription.id();
    let state = subscription.acquisition().state();

    if !subscription.is_healthy() {
        warn!(
            "{} {}: connection error ({} consecutive failures)",
            id,
            subscription.kind().label(),
            subscription.health().consecutive_failures()
        );
    }

    if !state.initialized() {
        info!("{} {}: waiting for data", id, subscription.kind().label());
        return;
    }

    match subscription.acquisition() {
        Acquisition::TimeDomain(acq) => {
            let now_s = nanos_to_secs(now);
            for buffer in acq.buffers() {
                match WindowStats::over(buffer, DisplayWindow::Short, now_s) {
                    Some(stats) => info!(
                        "{} {:<12} last {:>9.2}  avg {:>9.2}  min {:>9.2}  max {:>9.2}  ({} samples, {})",
                        id,
                        buffer.signal_name(),
                        stats.last,
                        stats.avg,
                        stats.min,
                        stats.max,
                        stats.count,
                        DisplayWindow::Short.label()
                    ),
                    None => info!("{} {:<12} no samples in window", id, buffer.signal_name()),
                }
            }
        }
        Acquisition::Spectral(acq) => {
            for buffer in acq.buffers() {
                info!("{} {}: {} points", id, buffer.signal_name(), buffer.len());
            }
        }
        Acquisition::PowerUsage(acq) => {
            let snapshot = acq.snapshot();
            let tariff = config.tariff();
            for period in UsagePeriod::ALL {
                info!(
                    "{} usage this {}: {:.2} kWh, {:.2} EUR",
                    id,
                    period.label(),
                    snapshot.kwh_used(period),
                    snapshot.cost(period, tariff)
                );
            }
            for row in snapshot.device_usage(UsagePeriod::Day) {
                info!("{}   {:<16} {:.2} kWh", id, row.name, row.usage);
            }
        }
        Acquisition::RealPower(acq) => {
            info!("{} real power {:.3} kW", id, acq.real_power_kw());
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    info!("Starting powermon simulator");

    let Some(config) = load_config() else {
        std::process::exit(1);
    };

    let service = SyntheticService::new(&config, RESPONSES.sender());
    let mut driver = match PollingDriver::from_config(service, RESPONSES.receiver(), &config) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Cannot start polling: {}", e);
            std::process::exit(1);
        }
    };

    let limit = run_limit();
    let started = Instant::now();
    let mut last_summary = Instant::now();

    loop {
        let frame_start = Instant::now();
        let now = epoch_nanos();

        driver.transport_mut().pump(now);
        driver.tick(now);

        if last_summary.elapsed() >= SUMMARY_INTERVAL {
            for subscription in driver.subscriptions() {
                log_summary(subscription, &config, now);
            }
            last_summary = Instant::now();
        }

        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            info!("Run time limit reached, exiting");
            break;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }
}
