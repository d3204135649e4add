//! Instantaneous real power scalar

use log::{debug, warn};

use super::payload::AcquisitionPayload;
use super::{AcquisitionState, DecodeOutcome, DecodeResult, Decoder, is_no_new_data};
use crate::channels::ChannelSet;
use crate::time::EpochNanos;

/// Decoder that keeps only the newest value of `channelValues`
#[derive(Debug, Clone)]
pub struct RealPowerAcquisition {
    channels: ChannelSet,
    real_power_w: f64,
    pub(super) state: AcquisitionState,
}

impl RealPowerAcquisition {
    pub fn new(channels: ChannelSet) -> Self {
        Self {
            channels,
            real_power_w: 0.0,
            state: AcquisitionState::default(),
        }
    }

    /// Last real power in W
    pub fn real_power_w(&self) -> f64 {
        self.real_power_w
    }

    /// Last real power in kW
    pub fn real_power_kw(&self) -> f64 {
        self.real_power_w / 1000.0
    }
}

impl Decoder for RealPowerAcquisition {
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult {
        let payload: AcquisitionPayload = serde_json::from_slice(payload)?;

        if is_no_new_data(payload.ref_trigger_stamp) {
            return Ok(DecodeOutcome::NoNewData);
        }

        if let Some(names) = &payload.channel_names {
            if !self.channels.is_empty() {
                self.channels.check(names).map_err(|mismatch| {
                    warn!("Received other signals than requested (real power)");
                    mismatch
                })?;
            }
        }

        if let Some(&last) = payload
            .channel_values
            .as_ref()
            .and_then(|matrix| matrix.values.last())
        {
            self.real_power_w = last;
        }

        let ref_trigger = payload
            .ref_trigger_stamp
            .unwrap_or(self.state.last_ref_trigger());
        self.state.record_success(ref_trigger, ref_trigger, now);

        debug!("Real power {:.3} kW", self.real_power_kw());
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
    use crate::acquisition::DecodeError;

    const NOW: EpochNanos = 3_000_000_000;

    fn decoder() -> RealPowerAcquisition {
        RealPowerAcquisition::new(ChannelSet::new(["P@100Hz"]))
    }

    #[test]
    fn test_keeps_last_value_in_kw() {
        let mut acq = decoder();
        let payload = r#"{"refTriggerStamp": 1000, "channelNames": ["P@100Hz"],
            "channelValues": {"dims": [1, 3], "values": [100.0, 200.0, 1500.0]}}"#;

        assert_eq!(
            acq.deserialize(payload.as_bytes(), NOW),
            Ok(DecodeOutcome::Updated)
        );
        assert_eq!(acq.real_power_w(), 1500.0);
        assert_eq!(acq.real_power_kw(), 1.5);
        assert_eq!(acq.state().last_timestamp(), 1000);
    }

    #[test]
    fn test_empty_values_keep_previous() {
        let mut acq = decoder();
        acq.deserialize(
            br#"{"refTriggerStamp": 1, "channelValues": {"dims": [1, 1], "values": [500.0]}}"#,
            NOW,
        )
        .unwrap();
        acq.deserialize(
            br#"{"refTriggerStamp": 2, "channelValues": {"dims": [1, 0], "values": []}}"#,
            NOW,
        )
        .unwrap();

        assert_eq!(acq.real_power_w(), 500.0);
        assert_eq!(acq.state().last_ref_trigger(), 2);
    }

    #[test]
    fn test_foreign_channel_rejected() {
        let mut acq = decoder();
        let payload = r#"{"refTriggerStamp": 1, "channelNames": ["Q@100Hz"],
            "channelValues": {"dims": [1, 1], "values": [9.0]}}"#;

        assert!(matches!(
            acq.deserialize(payload.as_bytes(), NOW),
            Err(DecodeError::ChannelMismatch { .. })
        ));
        assert_eq!(acq.real_power_w(), 0.0);
    }

    #[test]
    fn test_missing_trigger_keeps_cursor() {
        let mut acq = decoder();
        acq.deserialize(
            br#"{"refTriggerStamp": 40, "channelValues": {"dims": [1, 1], "values": [1.0]}}"#,
            NOW,
        )
        .unwrap();
        acq.deserialize(br#"{"channelValues": {"dims": [1, 1], "values": [2.0]}}"#, NOW)
            .unwrap();

        assert_eq!(acq.real_power_w(), 2.0);
        assert_eq!(acq.state().last_timestamp(), 40);
    }
}
