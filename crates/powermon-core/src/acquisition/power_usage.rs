//! Aggregate per-device power usage and its derived figures

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use super::payload::PowerUsagePayload;
use super::{AcquisitionState, DecodeOutcome, DecodeResult, Decoder, is_no_new_data};
use crate::channels::ChannelSet;
use crate::time::EpochNanos;

/// Aggregation period of the usage arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsagePeriod {
    Day,
    Week,
    Month,
}

impl UsagePeriod {
    pub const ALL: [Self; 3] = [Self::Day, Self::Week, Self::Month];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// Energy price in cents per kWh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    pub cents_per_kwh: f64,
}

impl Tariff {
    pub const DEFAULT_CENTS_PER_KWH: f64 = 30.0;

    pub const fn new(cents_per_kwh: f64) -> Self {
        Self { cents_per_kwh }
    }

    /// Cost in whole currency units of `kwh`
    pub fn cost_of(&self, kwh: f64) -> f64 {
        kwh * self.cents_per_kwh / 100.0
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CENTS_PER_KWH)
    }
}

/// One row of the per-device usage table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceUsage<'a> {
    pub name: &'a str,
    pub usage: f64,
}

/// Last accepted power usage payload plus the sums derived from it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerUsageSnapshot {
    pub devices: Vec<String>,
    pub usages: Vec<f64>,
    pub day_usage: Vec<f64>,
    pub week_usage: Vec<f64>,
    pub month_usage: Vec<f64>,
    pub timestamp: Option<i64>,
    pub kwh_used_day: f64,
    pub kwh_used_week: f64,
    pub kwh_used_month: f64,
    pub total_usage: f64,
}

impl PowerUsageSnapshot {
    fn from_payload(payload: PowerUsagePayload) -> Self {
        let sum = |values: &[f64]| values.iter().sum::<f64>();

        Self {
            kwh_used_day: sum(&payload.day_usage),
            kwh_used_week: sum(&payload.week_usage),
            kwh_used_month: sum(&payload.month_usage),
            total_usage: sum(&payload.values),
            devices: payload.names,
            usages: payload.values,
            day_usage: payload.day_usage,
            week_usage: payload.week_usage,
            month_usage: payload.month_usage,
            timestamp: payload.timestamp,
        }
    }

    /// Per-device usage array for `period`
    pub fn usage(&self, period: UsagePeriod) -> &[f64] {
        match period {
            UsagePeriod::Day => &self.day_usage,
            UsagePeriod::Week => &self.week_usage,
            UsagePeriod::Month => &self.month_usage,
        }
    }

    pub fn kwh_used(&self, period: UsagePeriod) -> f64 {
        match period {
            UsagePeriod::Day => self.kwh_used_day,
            UsagePeriod::Week => self.kwh_used_week,
            UsagePeriod::Month => self.kwh_used_month,
        }
    }

    pub fn cost(&self, period: UsagePeriod, tariff: Tariff) -> f64 {
        tariff.cost_of(self.kwh_used(period))
    }

    /// Device names paired with their usage for `period`.
    ///
    /// Pairs are formed by position; extra entries on either side are dropped.
    pub fn device_usage(&self, period: UsagePeriod) -> impl Iterator<Item = DeviceUsage<'_>> {
        self.devices
            .iter()
            .zip(self.usage(period))
            .map(|(name, &usage)| DeviceUsage {
                name: name.as_str(),
                usage,
            })
    }
}

/// Decoder for the aggregate usage endpoint.
///
/// The cursor is the delivery time, which is what interval gating compares
/// against.
#[derive(Debug, Clone)]
pub struct PowerUsageAcquisition {
    channels: ChannelSet,
    snapshot: PowerUsageSnapshot,
    pub(super) state: AcquisitionState,
}

impl PowerUsageAcquisition {
    pub fn new(channels: ChannelSet) -> Self {
        Self {
            channels,
            snapshot: PowerUsageSnapshot::default(),
            state: AcquisitionState::default(),
        }
    }

    pub fn snapshot(&self) -> &PowerUsageSnapshot {
        &self.snapshot
    }
}

impl Decoder for PowerUsageAcquisition {
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult {
        let payload: PowerUsagePayload = serde_json::from_slice(payload)?;

        if is_no_new_data(payload.ref_trigger_stamp) {
            return Ok(DecodeOutcome::NoNewData);
        }

        let ref_trigger = payload
            .ref_trigger_stamp
            .unwrap_or(self.state.last_ref_trigger());
        self.snapshot = PowerUsageSnapshot::from_payload(payload);
        self.state.record_success(ref_trigger, now, now);

        debug!(
            "Power usage: {} devices, {:.3} kWh today",
            self.snapshot.devices.len(),
            self.snapshot.kwh_used_day
        );
        Ok(DecodeOutcome::Updated)
    }

    fn state(&self) -> &AcquisitionState {
        &self.state
    }

    fn channels(&self) -> &ChannelSet {
        &self.channels
    }
}
