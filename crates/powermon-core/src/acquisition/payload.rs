//! Wire shapes of the acquisition service payloads.
//!
//! Field names are part of the service contract and are matched exactly.
//! Unknown fields are ignored.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Deserialize;

use crate::reassembly::StrideMatrix;

/// Time-domain acquisition (also used for the scalar real power endpoint)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AcquisitionPayload {
    pub ref_trigger_stamp: Option<u64>,
    pub channel_names: Option<Vec<String>>,
    pub channel_time_since_ref_trigger: Option<Vec<f64>>,
    pub channel_values: Option<StrideMatrix>,
}

/// Single-channel spectrum
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SpectrumPayload {
    pub ref_trigger_stamp: Option<u64>,
    pub channel_name: Option<String>,
    pub channel_magnitude_values: Option<Vec<f64>>,
    pub channel_frequency_values: Option<Vec<f64>>,
}

/// Aggregate per-device power usage
#[derive(Debug, Deserialize)]
pub(super) struct PowerUsagePayload {
    #[serde(rename = "refTriggerStamp")]
    pub ref_trigger_stamp: Option<u64>,
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub names: Vec<String>,
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub day_usage: Vec<f64>,
    #[serde(default)]
    pub week_usage: Vec<f64>,
    #[serde(default)]
    pub month_usage: Vec<f64>,
}
