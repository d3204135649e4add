//! Sample buffers backing each plotted signal
//!
//! Two lifecycle policies are provided:
//!
//! - [`ScrollingBuffer`]: bounded ring that overwrites the oldest sample once
//!   full. Used for streaming time-domain signals.
//! - [`StaticBuffer`]: bounded buffer whose contents are replaced wholesale on
//!   every update. Used for spectra and reference curves.

mod scrolling;
mod static_buffer;

use thiserror_no_std::Error;

pub use scrolling::{ChronologicalIter, ScrollingBuffer};
pub use static_buffer::StaticBuffer;

/// Default capacity of a scrolling buffer
pub const DEFAULT_SCROLLING_CAPACITY: usize = 50_000;

/// Default capacity of a static buffer
pub const DEFAULT_STATIC_CAPACITY: usize = 200_000;

/// One plotted point: absolute timestamp (or frequency) and value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Seconds since the UTC epoch (x axis)
    pub timestamp: f64,
    /// Signal value (y axis)
    pub value: f64,
}

impl Sample {
    pub const fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Error types for buffer operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// X and Y inputs of an assignment differ in length
    #[error("Length mismatch (x: {x_len}, y: {y_len})")]
    LengthMismatch {
        /// Number of x values supplied
        x_len: usize,
        /// Number of y values supplied
        y_len: usize,
    },

    /// A buffer must hold at least one sample
    #[error("Buffer capacity must be non-zero")]
    ZeroCapacity,
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;
