//! Bounded buffer replaced wholesale on every update

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use log::warn;

use super::{BufferError, BufferResult, Sample};

/// Buffer for signals that are delivered as a complete curve each time
/// (spectra, limiting curves). There is no incremental push.
#[derive(Debug, Clone)]
pub struct StaticBuffer {
    signal_name: String,
    capacity: usize,
    data: Vec<Sample>,
}

impl StaticBuffer {
    /// Create an empty buffer for `signal_name` holding at most `capacity` samples
    pub fn new(signal_name: impl Into<String>, capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        Ok(Self {
            signal_name: signal_name.into(),
            capacity,
            data: Vec::new(),
        })
    }

    /// Check that an x/y pair of columns can be assigned
    pub fn check_columns(xs: &[f64], ys: &[f64]) -> BufferResult<()> {
        if xs.len() != ys.len() {
            return Err(BufferError::LengthMismatch {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        Ok(())
    }

    /// Replace the entire contents with the zipped `xs`/`ys` columns.
    ///
    /// Columns longer than the capacity are truncated to the first
    /// `capacity` pairs. On error the buffer is left untouched.
    pub fn assign(&mut self, xs: &[f64], ys: &[f64]) -> BufferResult<()> {
        Self::check_columns(xs, ys)?;

        if xs.len() > self.capacity {
            warn!(
                "{}: truncating {} points to capacity {}",
                self.signal_name,
                xs.len(),
                self.capacity
            );
        }

        self.data.clear();
        self.data.extend(
            xs.iter()
                .zip(ys)
                .take(self.capacity)
                .map(|(&x, &y)| Sample::new(x, y)),
        );
        Ok(())
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn samples(&self) -> &[Sample] {
        &self.data
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
}
