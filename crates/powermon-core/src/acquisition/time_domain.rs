//! Strided multi-channel time-domain acquisitions

extern crate alloc;
use alloc::vec::Vec;

use log::{debug, warn};

use super::payload::AcquisitionPayload;
use super::{AcquisitionState, DecodeError, DecodeOutcome, DecodeResult, Decoder, is_no_new_data};
use crate::buffer::{BufferResult, ScrollingBuffer};
use crate::channels::ChannelSet;
use crate::reassembly::destride_into;
use crate::time::{EpochNanos, offset_by_secs};

/// Decoder for `channelValues` matrices, one scrolling buffer per channel
#[derive(Debug, Clone)]
pub struct TimeDomainAcquisition {
    channels: ChannelSet,
    buffers: Vec<ScrollingBuffer>,
    pub(super) state: AcquisitionState,
}

impl TimeDomainAcquisition {
    pub fn new(channels: ChannelSet) -> BufferResult<Self> {
        let buffers = channels.scrolling_buffers()?;
        Ok(Self {
            channels,
            buffers,
            state: AcquisitionState::default(),
        })
    }

    /// Buffers in channel set order
    pub fn buffers(&self) -> &[ScrollingBuffer] {
        &self.buffers
    }

    /// Buffer of a single signal
    pub fn buffer(&self, signal_name: &str) -> Option<&ScrollingBuffer> {
        self.buffers
            .iter()
            .find(|buffer| buffer.signal_name() == signal_name)
    }
}

impl Decoder for TimeDomainAcquisition {
    fn deserialize(&mut self, payload: &[u8], now: EpochNanos) -> DecodeResult {
        let payload: AcquisitionPayload = serde_json::from_slice(payload)?;

        if is_no_new_data(payload.ref_trigger_stamp) {
            debug!("No new data for {}", self.channels.joined());
            return Ok(DecodeOutcome::NoNewData);
        }

        if let Some(names) = &payload.channel_names {
            self.channels.check(names).map_err(|mismatch| {
                warn!("Received other signals than requested (time domain)");
                mismatch
            })?;
        }

        let ref_trigger = payload.ref_trigger_stamp.ok_or(DecodeError::MissingField {
            field: "refTriggerStamp",
        })?;
        let offsets = payload
            .channel_time_since_ref_trigger
            .ok_or(DecodeError::MissingField {
                field: "channelTimeSinceRefTrigger",
            })?;
        let matrix = payload.channel_values.ok_or(DecodeError::MissingField {
            field: "channelValues",
        })?;

        let written = destride_into(&matrix, &offsets, ref_trigger, &mut self.buffers)
            .map_err(|e| {
                warn!("Rejecting acquisition for {}: {}", self.channels.joined(), e);
                e
            })?;

        let last_timestamp = offsets
            .last()
            .map_or(ref_trigger, |&offset| offset_by_secs(ref_trigger, offset));
        self.state.record_success(ref_trigger, last_timestamp, now);

        debug!(
            "Appended {} samples to {} channels (cursor {})",
            written,
            self.buffers.len(),
            last_timestamp
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
