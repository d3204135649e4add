//! Single-channel spectra and reference curves

extern crate alloc;
use alloc::vec::Vec;

use core::slice;

use log::{debug, warn};

use super::payload::SpectrumPayload;
use super::{AcquisitionState, DecodeError, DecodeOutcome, DecodeResult, Decoder, is_no_new_data};
use crate::buffer::{BufferResult, StaticBuffer};
use crate::channels::ChannelSet;
use crate::time::EpochNanos;

/// Decoder for frequency/magnitude curves.
///
/// Each payload replaces the whole curve: x = frequency, y = magnitude.
/// Reference curves served without a trigger stamp are accepted with a
/// cursor of 0.
#[derive(Debug, Clone)]
pub struct SpectralAcquisition {
    channels: ChannelSet,
    buffers: Vec<StaticBuffer>,
    pub(super) state: AcquisitionState,
}

impl SpectralAcquisition {
    pub fn new(channels: ChannelSet) -> BufferResult<Self> {
        let buffers = channels.static_buffers()?;
        Ok(Self {
            channels,
            buffers,
            state: AcquisitionState::default(),
        })
    }

    /// Buffers in channel set order
    pub fn buffers(&self) -> &[StaticBuffer] {
        &self.buffers
    }
}

impl Decoder for SpectralAcquisition {
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult {
        let payload: SpectrumPayload = serde_json::from_slice(payload)?;

        if is_no_new_data(payload.ref_trigger_stamp) {
            debug!("No new spectrum for {}", self.channels.joined());
            return Ok(DecodeOutcome::NoNewData);
        }

        if let Some(name) = &payload.channel_name {
            self.channels
                .check(slice::from_ref(name))
                .map_err(|mismatch| {
                    warn!("Received other signals than requested (spectrum)");
                    mismatch
                })?;
        }

        let magnitudes = payload
            .channel_magnitude_values
            .ok_or(DecodeError::MissingField {
                field: "channelMagnitudeValues",
            })?;
        let frequencies = payload
            .channel_frequency_values
            .ok_or(DecodeError::MissingField {
                field: "channelFrequencyValues",
            })?;

        StaticBuffer::check_columns(&frequencies, &magnitudes)?;
        for buffer in &mut self.buffers {
            buffer.assign(&frequencies, &magnitudes)?;
        }

        let ref_trigger = payload.ref_trigger_stamp.unwrap_or_default();
        self.state.record_success(ref_trigger, ref_trigger, now);

        debug!("Assigned {} spectral points", frequencies.len());
        Ok(DecodeOutcome::Updated)
    }

    fn state(&self) -> &AcquisitionState {
        &self.state
    }

    fn channels(&self) -> &ChannelSet {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Sample;
    use crate::reassembly::ShapeError;

    const NOW: EpochNanos = 1;

    #[test]
    fn test_assigns_frequency_and_magnitude() {
        let mut acq = SpectralAcquisition::new(ChannelSet::new(["sinus_fft@32000Hz"])).unwrap();
        let payload = r#"{"refTriggerStamp": 42, "channelName": "sinus_fft@32000Hz",
            "channelMagnitudeValues": [-10.0, -20.0], "channelFrequencyValues": [50.0, 100.0]}"#;

        assert_eq!(
            acq.deserialize(payload.as_bytes(), NOW),
            Ok(DecodeOutcome::Updated)
        );
        assert_eq!(
            acq.buffers()[0].samples(),
            &[Sample::new(50.0, -10.0), Sample::new(100.0, -20.0)]
        );
        assert_eq!(acq.state().last_timestamp(), 42);
    }

    #[test]
    fn test_each_payload_replaces_curve() {
        let mut acq = SpectralAcquisition::new(ChannelSet::new(["fft"])).unwrap();
        let first = r#"{"refTriggerStamp": 1, "channelName": "fft",
            "channelMagnitudeValues": [1.0, 2.0, 3.0], "channelFrequencyValues": [1.0, 2.0, 3.0]}"#;
        let second = r#"{"refTriggerStamp": 2, "channelName": "fft",
            "channelMagnitudeValues": [9.0], "channelFrequencyValues": [4.0]}"#;

        acq.deserialize(first.as_bytes(), NOW).unwrap();
        acq.deserialize(second.as_bytes(), NOW).unwrap();
        assert_eq!(acq.buffers()[0].samples(), &[Sample::new(4.0, 9.0)]);
    }

    #[test]
    fn test_wrong_channel_rejected() {
        let mut acq = SpectralAcquisition::new(ChannelSet::new(["fft"])).unwrap();
        let payload = r#"{"refTriggerStamp": 1, "channelName": "other",
            "channelMagnitudeValues": [1.0], "channelFrequencyValues": [1.0]}"#;

        assert!(matches!(
            acq.deserialize(payload.as_bytes(), NOW),
            Err(DecodeError::ChannelMismatch { .. })
        ));
        assert!(acq.buffers()[0].is_empty());
        assert!(!acq.state().initialized());
    }

    #[test]
    fn test_column_length_mismatch_rejected() {
        let mut acq = SpectralAcquisition::new(ChannelSet::new(["fft"])).unwrap();
        let payload = r#"{"refTriggerStamp": 1, "channelName": "fft",
            "channelMagnitudeValues": [1.0, 2.0], "channelFrequencyValues": [1.0]}"#;

        assert_eq!(
            acq.deserialize(payload.as_bytes(), NOW),
            Err(DecodeError::ShapeMismatch(ShapeError::ColumnLength {
                left: 1,
                right: 2
            }))
        );
        assert!(acq.buffers()[0].is_empty());
    }

    #[test]
    fn test_reference_curve_without_trigger() {
        let mut acq = SpectralAcquisition::new(ChannelSet::new(["limiting_curve"])).unwrap();
        let payload = r#"{"channelMagnitudeValues": [0.0, -3.0], "channelFrequencyValues": [0.0, 1000.0]}"#;

        assert_eq!(
            acq.deserialize(payload.as_bytes(), NOW),
            Ok(DecodeOutcome::Updated)
        );
        assert_eq!(acq.buffers()[0].len(), 2);
        assert_eq!(acq.state().last_ref_trigger(), 0);
    }
}
