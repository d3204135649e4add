//! Dashboard configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` yields the NILM
//! dashboard setup.

extern crate alloc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::acquisition::{AcquisitionKind, Tariff};
use crate::channels::ChannelSet;
use crate::transport::MAX_SUBSCRIPTIONS;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Marker in a base URL for endpoints serving a fixed reference curve
const ONE_SHOT_URL_MARKER: &str = "limiting_curve";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config JSON at line {line}, column {column}")]
    Parse { line: usize, column: usize },
    #[error("{count} subscriptions configured, at most {max} supported")]
    TooManySubscriptions { count: usize, max: usize },
    #[error("Subscription {index} has an empty base URL")]
    EmptyBaseUrl { index: usize },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            line: err.line(),
            column: err.column(),
        }
    }
}

/// One endpoint to poll
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubscriptionConfig {
    pub base_url: String,
    #[serde(default)]
    pub channels: Vec<String>,
    pub kind: AcquisitionKind,
    /// Keep requesting from cursor 0 (static reference curves). Derived from
    /// the URL when absent.
    #[serde(default)]
    pub one_shot: Option<bool>,
}

impl SubscriptionConfig {
    pub fn new<I, S>(base_url: &str, channels: I, kind: AcquisitionKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base_url: base_url.to_string(),
            channels: channels.into_iter().map(Into::into).collect(),
            kind,
            one_shot: None,
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot
            .unwrap_or_else(|| self.base_url.contains(ONE_SHOT_URL_MARKER))
    }

    pub fn channel_set(&self) -> ChannelSet {
        ChannelSet::new(self.channels.iter().map(String::as_str))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub poll_interval_ms: u64,
    pub tariff_cents_per_kwh: f64,
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tariff_cents_per_kwh: Tariff::DEFAULT_CENTS_PER_KWH,
            subscriptions: vec![
                SubscriptionConfig::new(
                    "http://localhost:8081/",
                    ["nilm_predict_values"],
                    AcquisitionKind::PowerUsage,
                ),
                SubscriptionConfig::new(
                    "http://localhost:8080/pulsed_power/Acquisition?channelNameFilter=",
                    ["P@100Hz", "Q@100Hz", "S@100Hz", "phi@100Hz"],
                    AcquisitionKind::TimeDomain,
                ),
            ],
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriptions.len() > MAX_SUBSCRIPTIONS {
            return Err(ConfigError::TooManySubscriptions {
                count: self.subscriptions.len(),
                max: MAX_SUBSCRIPTIONS,
            });
        }

        if let Some(index) = self
            .subscriptions
            .iter()
            .position(|sub| sub.base_url.is_empty())
        {
            return Err(ConfigError::EmptyBaseUrl { index });
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tariff(&self) -> Tariff {
        Tariff::new(self.tariff_cents_per_kwh)
    }
}
