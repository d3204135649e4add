//! Expected channel sets and buffer sizing policy
//!
//! A [`ChannelSet`] is bound when a subscription is created and never changes.
//! Its order defines which buffer a decoded row lands in, so payloads are
//! validated against it position by position.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use log::warn;

use crate::buffer::{
    BufferResult, DEFAULT_SCROLLING_CAPACITY, DEFAULT_STATIC_CAPACITY, ScrollingBuffer,
    StaticBuffer,
};

/// Separator used when joining channel names into a request target
pub const CHANNEL_SEPARATOR: &str = ",";

/// Signals that get a dedicated scrolling capacity.
///
/// The 1 kHz mains signals are only ever shown as a 60 ms trace, so keeping
/// 60 samples is enough.
static SCROLLING_CAPACITY_OVERRIDES: &[(&str, usize)] = &[
    ("U@1000Hz", 60),
    ("I@1000Hz", 60),
    ("U_bpf@1000Hz", 60),
    ("I_bpf@1000Hz", 60),
];

/// Scrolling buffer capacity for a given signal name
pub fn scrolling_capacity(signal_name: &str) -> usize {
    SCROLLING_CAPACITY_OVERRIDES
        .iter()
        .find(|(name, _)| *name == signal_name)
        .map(|(_, capacity)| *capacity)
        .unwrap_or(DEFAULT_SCROLLING_CAPACITY)
}

/// First position at which a received channel list disagrees with the
/// expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMismatch {
    /// Index of the first differing entry (or the shorter length)
    pub position: usize,
    /// Number of channels expected
    pub expected_len: usize,
    /// Number of channels received
    pub received_len: usize,
}

/// Ordered, immutable list of the signal names a subscription expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    names: Vec<String>,
}

impl ChannelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Channel names joined for use in a request target (`A,B,C`)
    pub fn joined(&self) -> String {
        self.names.join(CHANNEL_SEPARATOR)
    }

    /// Compare a received channel list position by position
    pub fn check<S: AsRef<str>>(&self, received: &[S]) -> Result<(), ChannelMismatch> {
        let mismatch_at = |position| ChannelMismatch {
            position,
            expected_len: self.names.len(),
            received_len: received.len(),
        };

        if let Some(position) = self
            .names
            .iter()
            .zip(received)
            .position(|(expected, got)| expected.as_str() != got.as_ref())
        {
            warn!(
                "Received channel {:?} at position {}, expected {:?}",
                received[position].as_ref(),
                position,
                self.names[position]
            );
            return Err(mismatch_at(position));
        }

        if received.len() != self.names.len() {
            warn!(
                "Received {} channels, expected {}",
                received.len(),
                self.names.len()
            );
            return Err(mismatch_at(received.len().min(self.names.len())));
        }

        Ok(())
    }

    /// One scrolling buffer per channel, sized by [`scrolling_capacity`]
    pub fn scrolling_buffers(&self) -> BufferResult<Vec<ScrollingBuffer>> {
        self.names
            .iter()
            .map(|name| ScrollingBuffer::new(name.as_str(), scrolling_capacity(name)))
            .collect()
    }

    /// One static buffer per channel with the default capacity
    pub fn static_buffers(&self) -> BufferResult<Vec<StaticBuffer>> {
        self.names
            .iter()
            .map(|name| StaticBuffer::new(name.as_str(), DEFAULT_STATIC_CAPACITY))
            .collect()
    }
}
