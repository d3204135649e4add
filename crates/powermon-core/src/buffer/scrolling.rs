//! Bounded ring buffer with a wrap-around write cursor

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use core::iter::Chain;
use core::slice::Iter;

use super::{BufferError, BufferResult, Sample};

/// Iterator over a scrolling buffer from oldest to newest sample
pub type ChronologicalIter<'a> = Chain<Iter<'a, Sample>, Iter<'a, Sample>>;

/// Ring buffer of samples for one streaming signal.
///
/// Until the buffer is full samples are appended. Afterwards each push
/// overwrites the slot at `offset` (the oldest sample) and advances the
/// cursor, so the backing storage is only in chronological order when read
/// starting at `offset`.
#[derive(Debug, Clone)]
pub struct ScrollingBuffer {
    signal_name: String,
    capacity: usize,
    offset: usize,
    data: Vec<Sample>,
}

impl ScrollingBuffer {
    /// Create an empty buffer for `signal_name` holding at most `capacity` samples
    pub fn new(signal_name: impl Into<String>, capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        Ok(Self {
            signal_name: signal_name.into(),
            capacity,
            offset: 0,
            data: Vec::new(),
        })
    }

    /// Add a sample, overwriting the oldest one when full
    pub fn push(&mut self, sample: Sample) {
        if self.data.len() < self.capacity {
            self.data.push(sample);
        } else {
            self.data[self.offset] = sample;
            self.offset = (self.offset + 1) % self.capacity;
        }
    }

    /// Drop all samples and reset the write cursor
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data.clear();
            self.offset = 0;
        }
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> ChronologicalIter<'_> {
        let (newer, older) = self.data.split_at(self.offset);
        older.iter().chain(newer.iter())
    }

    /// Backing storage in slot order, to be read starting at [`Self::offset`]
    pub fn as_slice(&self) -> &[Sample] {
        &self.data
    }

    /// Index of the oldest sample in [`Self::as_slice`]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&Sample> {
        if self.data.is_empty() {
            return None;
        }
        let newest = (self.offset + self.data.len() - 1) % self.data.len();
        self.data.get(newest)
    }

    pub fn signal_name(&self) -> &str {
        &self.signal_name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }
}

impl<'a> IntoIterator for &'a ScrollingBuffer {
    type Item = &'a Sample;
    type IntoIter = ChronologicalIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
