//! Destriding of flat acquisition matrices into per-channel buffers
//!
//! Acquisition services deliver all channels of one acquisition as a single
//! flat value array with `dims = [channels, samples]`, stored row-major per
//! channel. Each sample carries a time relative to the acquisition's
//! reference trigger; absolute sample times are `ref_trigger + offset[j]`.

extern crate alloc;
use alloc::vec::Vec;

use serde::Deserialize;
use thiserror_no_std::Error;

use crate::buffer::{Sample, ScrollingBuffer};
use crate::time::{EpochNanos, nanos_to_secs};

/// Flat `channels × samples` value matrix as delivered on the wire
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StrideMatrix {
    #[serde(default)]
    pub dims: Vec<usize>,
    #[serde(default)]
    pub values: Vec<f64>,
}

/// Reasons a stride matrix cannot be destrided into the bound buffers
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    /// `dims` must name exactly a channel count and a sample count
    #[error("Expected 2 dims, got {got}")]
    Rank {
        /// Number of dims received
        got: usize,
    },

    /// `values` does not hold `channels * samples` entries
    #[error("Expected {expected} values, got {got}")]
    ValueCount {
        /// `channels * samples`
        expected: usize,
        /// Length of the value array
        got: usize,
    },

    /// Matrix channel count differs from the number of bound buffers
    #[error("Matrix has {got} channels, {expected} buffers are bound")]
    ChannelCount {
        /// Number of bound buffers
        expected: usize,
        /// Channel count from `dims`
        got: usize,
    },

    /// One relative timestamp is required per sample column
    #[error("Expected {expected} relative timestamps, got {got}")]
    OffsetCount {
        /// Sample count from `dims`
        expected: usize,
        /// Number of relative timestamps received
        got: usize,
    },

    /// Paired columns (x and y) of different lengths
    #[error("Column length mismatch ({left} vs {right})")]
    ColumnLength {
        /// Length of the first column
        left: usize,
        /// Length of the second column
        right: usize,
    },
}

impl StrideMatrix {
    pub fn new(channels: usize, samples: usize, values: Vec<f64>) -> Self {
        Self {
            dims: alloc::vec![channels, samples],
            values,
        }
    }

    /// Number of channels (rows)
    pub fn channel_count(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Number of samples per channel (the stride)
    pub fn sample_count(&self) -> usize {
        self.dims.get(1).copied().unwrap_or(0)
    }

    /// Check that the matrix is rank 2 and its value count matches `dims`
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.dims.len() != 2 {
            return Err(ShapeError::Rank {
                got: self.dims.len(),
            });
        }

        let expected = self
            .channel_count()
            .checked_mul(self.sample_count())
            .unwrap_or(usize::MAX);
        if self.values.len() != expected {
            return Err(ShapeError::ValueCount {
                expected,
                got: self.values.len(),
            });
        }

        Ok(())
    }

    /// Values of one channel. Only meaningful after [`Self::validate`].
    pub fn channel(&self, index: usize) -> &[f64] {
        let stride = self.sample_count();
        let start = index * stride;
        self.values.get(start..start + stride).unwrap_or(&[])
    }
}

/// Validate a matrix against the bound buffers and relative timestamps
/// without touching any buffer
pub fn check_shape(
    matrix: &StrideMatrix,
    relative_offsets: &[f64],
    buffer_count: usize,
) -> Result<(), ShapeError> {
    matrix.validate()?;

    if matrix.channel_count() != buffer_count {
        return Err(ShapeError::ChannelCount {
            expected: buffer_count,
            got: matrix.channel_count(),
        });
    }

    if relative_offsets.len() != matrix.sample_count() {
        return Err(ShapeError::OffsetCount {
            expected: matrix.sample_count(),
            got: relative_offsets.len(),
        });
    }

    Ok(())
}

/// Destride `matrix` into `buffers`, one row per buffer.
///
/// Sample `j` of channel `i` is read from flat index `i * stride + j` and
/// timestamped `ref_trigger + relative_offsets[j]`. Nothing is written unless
/// the shape checks pass.
pub fn destride_into(
    matrix: &StrideMatrix,
    relative_offsets: &[f64],
    ref_trigger: EpochNanos,
    buffers: &mut [ScrollingBuffer],
) -> Result<usize, ShapeError> {
    check_shape(matrix, relative_offsets, buffers.len())?;

    let ref_trigger_s = nanos_to_secs(ref_trigger);

    for (index, buffer) in buffers.iter_mut().enumerate() {
        for (&offset, &value) in relative_offsets.iter().zip(matrix.channel(index)) {
            buffer.push(Sample::new(ref_trigger_s + offset, value));
        }
    }

    Ok(matrix.sample_count())
}
