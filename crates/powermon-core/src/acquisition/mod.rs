//! Acquisition payload decoders
//!
//! Every subscription owns exactly one decoder. The decoder parses a JSON
//! payload, checks that the channels it describes are the ones the
//! subscription asked for, and only then writes into its buffers or scalar
//! state. A rejected payload never changes anything.
//!
//! ## Variants
//!
//! | Kind | Payload | Result |
//! |------|---------|--------|
//! | [`TimeDomainAcquisition`] | strided `channelValues` + relative timestamps | scrolling buffers |
//! | [`SpectralAcquisition`] | `channelFrequencyValues` / `channelMagnitudeValues` | static buffers |
//! | [`PowerUsageAcquisition`] | per-device usage arrays | [`PowerUsageSnapshot`] |
//! | [`RealPowerAcquisition`] | last value of `channelValues` | scalar kW |
//!
//! A `refTriggerStamp` of `0` means the service has nothing new yet; every
//! variant reports it as [`DecodeOutcome::NoNewData`].

mod payload;
mod power_usage;
mod real_power;
mod spectral;
mod time_domain;

extern crate alloc;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::buffer::{BufferError, BufferResult};
use crate::channels::{ChannelMismatch, ChannelSet};
use crate::reassembly::ShapeError;
use crate::time::EpochNanos;

pub use power_usage::{DeviceUsage, PowerUsageAcquisition, PowerUsageSnapshot, Tariff, UsagePeriod};
pub use real_power::RealPowerAcquisition;
pub use spectral::SpectralAcquisition;
pub use time_domain::TimeDomainAcquisition;

/// Reference trigger value meaning "no new data since the requested cursor"
pub const NO_NEW_DATA_STAMP: u64 = 0;

/// Result of a decode that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Buffers and cursors were updated
    Updated,
    /// The service reported no new data; nothing was changed
    NoNewData,
}

/// Error types for payload decoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid JSON or a field has the wrong type
    #[error("Malformed payload at line {line}, column {column}")]
    Malformed {
        /// Line of the syntax or type error
        line: usize,
        /// Column of the syntax or type error
        column: usize,
    },

    /// A field this variant cannot work without is absent
    #[error("Missing field: {field}")]
    MissingField {
        /// Wire name of the missing field
        field: &'static str,
    },

    /// Received channels differ from the subscription's channel set
    #[error("Channel mismatch at position {position} (expected {expected} channels, received {received})")]
    ChannelMismatch {
        /// First differing position
        position: usize,
        /// Number of channels expected
        expected: usize,
        /// Number of channels received
        received: usize,
    },

    /// Array dimensions are inconsistent
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(ShapeError),

    /// A buffer rejected the decoded data
    #[error("Buffer error: {0}")]
    Buffer(BufferError),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            line: err.line(),
            column: err.column(),
        }
    }
}

impl From<ChannelMismatch> for DecodeError {
    fn from(mismatch: ChannelMismatch) -> Self {
        Self::ChannelMismatch {
            position: mismatch.position,
            expected: mismatch.expected_len,
            received: mismatch.received_len,
        }
    }
}

impl From<ShapeError> for DecodeError {
    fn from(err: ShapeError) -> Self {
        Self::ShapeMismatch(err)
    }
}

impl From<BufferError> for DecodeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::LengthMismatch { x_len, y_len } => {
                Self::ShapeMismatch(ShapeError::ColumnLength {
                    left: x_len,
                    right: y_len,
                })
            }
            other => Self::Buffer(other),
        }
    }
}

/// Result type for decode operations
pub type DecodeResult = Result<DecodeOutcome, DecodeError>;

/// Bookkeeping shared by all decoder variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionState {
    last_timestamp: EpochNanos,
    last_ref_trigger: EpochNanos,
    success: bool,
    initialized: bool,
    delivery_time: Option<EpochNanos>,
}

impl AcquisitionState {
    /// Cursor for the next incremental request
    pub fn last_timestamp(&self) -> EpochNanos {
        self.last_timestamp
    }

    /// Reference trigger of the last accepted payload
    pub fn last_ref_trigger(&self) -> EpochNanos {
        self.last_ref_trigger
    }

    /// Whether the last fetch cycle ended with an applied payload
    pub fn success(&self) -> bool {
        self.success
    }

    /// Whether any payload has ever been applied
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Wall clock time of the last applied payload
    pub fn delivery_time(&self) -> Option<EpochNanos> {
        self.delivery_time
    }

    pub(crate) fn record_success(
        &mut self,
        ref_trigger: EpochNanos,
        last_timestamp: EpochNanos,
        now: EpochNanos,
    ) {
        self.last_ref_trigger = ref_trigger;
        self.last_timestamp = last_timestamp;
        self.success = true;
        self.initialized = true;
        self.delivery_time = Some(now);
    }

    pub(crate) fn record_failure(&mut self) {
        self.success = false;
    }
}

/// Shared decode interface implemented by every variant
pub trait Decoder {
    /// Parse `payload` and apply it if it is valid and carries new data.
    ///
    /// `now` is the wall clock used to stamp the delivery time.
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult;

    /// Cursor and status flags
    fn state(&self) -> &AcquisitionState;

    /// Channels this decoder accepts
    fn channels(&self) -> &ChannelSet;
}

/// The payload shape a subscription expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// Strided time-domain acquisition (U, I, P, Q, S, phi, ...)
    TimeDomain,
    /// Frequency spectrum or reference curve
    Spectral,
    /// Aggregate per-device power usage
    PowerUsage,
    /// Instantaneous real power scalar
    RealPower,
}

impl AcquisitionKind {
    /// Streaming kinds are polled every tick; aggregate kinds on an interval
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::TimeDomain | Self::Spectral)
    }

    /// Get a short label for logging
    pub const fn label(self) -> &'static str {
        match self {
            Self::TimeDomain => "time-domain",
            Self::Spectral => "spectral",
            Self::PowerUsage => "power-usage",
            Self::RealPower => "real-power",
        }
    }
}

/// Closed set of decoders, one per payload shape
#[derive(Debug, Clone)]
pub enum Acquisition {
    TimeDomain(TimeDomainAcquisition),
    Spectral(SpectralAcquisition),
    PowerUsage(PowerUsageAcquisition),
    RealPower(RealPowerAcquisition),
}

impl Acquisition {
    /// Create the decoder for `kind` bound to `channels`
    pub fn new(kind: AcquisitionKind, channels: ChannelSet) -> BufferResult<Self> {
        Ok(match kind {
            AcquisitionKind::TimeDomain => Self::TimeDomain(TimeDomainAcquisition::new(channels)?),
            AcquisitionKind::Spectral => Self::Spectral(SpectralAcquisition::new(channels)?),
            AcquisitionKind::PowerUsage => Self::PowerUsage(PowerUsageAcquisition::new(channels)),
            AcquisitionKind::RealPower => Self::RealPower(RealPowerAcquisition::new(channels)),
        })
    }

    pub fn kind(&self) -> AcquisitionKind {
        match self {
            Self::TimeDomain(_) => AcquisitionKind::TimeDomain,
            Self::Spectral(_) => AcquisitionKind::Spectral,
            Self::PowerUsage(_) => AcquisitionKind::PowerUsage,
            Self::RealPower(_) => AcquisitionKind::RealPower,
        }
    }

    /// Clear `success` after a failed fetch cycle. Buffers and cursors are
    /// kept.
    pub(crate) fn mark_failed(&mut self) {
        let state = match self {
            Self::TimeDomain(acq) => &mut acq.state,
            Self::Spectral(acq) => &mut acq.state,
            Self::PowerUsage(acq) => &mut acq.state,
            Self::RealPower(acq) => &mut acq.state,
        };
        state.record_failure();
    }

    pub fn as_time_domain(&self) -> Option<&TimeDomainAcquisition> {
        match self {
            Self::TimeDomain(acq) => Some(acq),
            _ => None,
        }
    }

    pub fn as_spectral(&self) -> Option<&SpectralAcquisition> {
        match self {
            Self::Spectral(acq) => Some(acq),
            _ => None,
        }
    }

    pub fn as_power_usage(&self) -> Option<&PowerUsageAcquisition> {
        match self {
            Self::PowerUsage(acq) => Some(acq),
            _ => None,
        }
    }

    pub fn as_real_power(&self) -> Option<&RealPowerAcquisition> {
        match self {
            Self::RealPower(acq) => Some(acq),
            _ => None,
        }
    }
}

impl Decoder for Acquisition {
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult {
        match self {
            Self::TimeDomain(acq) => acq.deserialize(payload, now),
            Self::Spectral(acq) => acq.deserialize(payload, now),
            Self::PowerUsage(acq) => acq.deserialize(payload, now),
            Self::RealPower(acq) => acq.deserialize(payload, now),
        }
    }

    fn state(&self) -> &AcquisitionState {
        match self {
            Self::TimeDomain(acq) => acq.state(),
            Self::Spectral(acq) => acq.state(),
            Self::PowerUsage(acq) => acq.state(),
            Self::RealPower(acq) => acq.state(),
        }
    }

    fn channels(&self) -> &ChannelSet {
        match self {
            Self::TimeDomain(acq) => acq.channels(),
            Self::Spectral(acq) => acq.channels(),
            Self::PowerUsage(acq) => acq.channels(),
            Self::RealPower(acq) => acq.channels(),
        }
    }
}

fn is_no_new_data(ref_trigger_stamp: Option<u64>) -> bool {
    ref_trigger_stamp == Some(NO_NEW_DATA_STAMP)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: EpochNanos = 5_000_000_000;

    fn decode_all_kinds(payload: &str) -> Vec<(Acquisition, DecodeResult)> {
        [
            AcquisitionKind::TimeDomain,
            AcquisitionKind::Spectral,
            AcquisitionKind::PowerUsage,
            AcquisitionKind::RealPower,
        ]
        .into_iter()
        .map(|kind| {
            let mut acq = Acquisition::new(kind, ChannelSet::new(["A"])).unwrap();
            let result = acq.deserialize(payload.as_bytes(), NOW);
            (acq, result)
        })
        .collect()
    }

    #[test]
    fn test_zero_trigger_is_no_op_for_every_kind() {
        let payload = r#"{"refTriggerStamp": 0, "channelNames": ["A"], "channelName": "A",
            "channelTimeSinceRefTrigger": [0.0], "channelValues": {"dims": [1, 1], "values": [1.0]},
            "channelMagnitudeValues": [1.0], "channelFrequencyValues": [1.0],
            "values": [1.0], "names": ["fridge"], "day_usage": [1.0]}"#;

        for (acq, result) in decode_all_kinds(payload) {
            assert_eq!(result, Ok(DecodeOutcome::NoNewData), "{:?}", acq.kind());
            assert_eq!(*acq.state(), AcquisitionState::default(), "{:?}", acq.kind());
        }
    }

    #[test]
    fn test_malformed_json_for_every_kind() {
        for (acq, result) in decode_all_kinds("{\"refTriggerStamp\": ") {
            assert!(
                matches!(result, Err(DecodeError::Malformed { .. })),
                "{:?}",
                acq.kind()
            );
            assert!(!acq.state().initialized());
        }
    }

    #[test]
    fn test_kind_round_trip() {
        let acq = Acquisition::new(AcquisitionKind::Spectral, ChannelSet::new(["A"])).unwrap();
        assert_eq!(acq.kind(), AcquisitionKind::Spectral);
        assert!(acq.as_spectral().is_some());
        assert!(acq.as_time_domain().is_none());
        assert_eq!(acq.channels().names(), &["A"]);
    }

    #[test]
    fn test_buffer_length_mismatch_maps_to_shape() {
        let err: DecodeError = BufferError::LengthMismatch { x_len: 2, y_len: 3 }.into();
        assert_eq!(
            err,
            DecodeError::ShapeMismatch(ShapeError::ColumnLength { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_streaming_kinds() {
        assert!(AcquisitionKind::TimeDomain.is_streaming());
        assert!(AcquisitionKind::Spectral.is_streaming());
        assert!(!AcquisitionKind::PowerUsage.is_streaming());
        assert!(!AcquisitionKind::RealPower.is_streaming());
    }
}
