//! Time units shared by the decoders, cursors and the polling driver.
//!
//! Trigger stamps and request cursors are integer nanoseconds since the UTC
//! epoch. Sample timestamps are `f64` seconds because that is what plotting
//! axes consume.

use embassy_time::Duration;

/// Nanoseconds since the UTC epoch
pub type EpochNanos = u64;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert an epoch stamp in nanoseconds to floating point seconds
pub fn nanos_to_secs(nanos: EpochNanos) -> f64 {
    nanos as f64 / NANOS_PER_SEC as f64
}

/// Offset an epoch stamp by a relative time in seconds.
///
/// Rounds to the nearest nanosecond and saturates instead of wrapping.
pub fn offset_by_secs(nanos: EpochNanos, offset_secs: f64) -> EpochNanos {
    let delta = offset_secs * NANOS_PER_SEC as f64;
    if !delta.is_finite() {
        return nanos;
    }
    // `as` truncates toward zero and saturates
    let rounded = if delta >= 0.0 { delta + 0.5 } else { delta - 0.5 };
    nanos.saturating_add_signed(rounded as i64)
}

/// Whether at least `interval` has passed between `since` and `now`
pub fn elapsed_at_least(now: EpochNanos, since: EpochNanos, interval: Duration) -> bool {
    let elapsed_us = now.saturating_sub(since) / 1_000;
    elapsed_us >= interval.as_micros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_to_secs() {
        assert_eq!(nanos_to_secs(1_000_000_000), 1.0);
        assert_eq!(nanos_to_secs(1_500_000_000), 1.5);
        assert_eq!(nanos_to_secs(0), 0.0);
    }

    #[test]
    fn test_offset_by_secs_rounds_to_nanos() {
        assert_eq!(offset_by_secs(1_000_000_000, 0.5), 1_500_000_000);
        assert_eq!(offset_by_secs(1_000_000_000, 0.000_000_000_4), 1_000_000_000);
        assert_eq!(offset_by_secs(1_000_000_000, -0.25), 750_000_000);
    }

    #[test]
    fn test_offset_by_secs_saturates() {
        assert_eq!(offset_by_secs(100, -1.0), 0);
        assert_eq!(offset_by_secs(u64::MAX - 1, 1.0), u64::MAX);
        assert_eq!(offset_by_secs(42, f64::NAN), 42);
    }

    #[test]
    fn test_elapsed_at_least() {
        let second = Duration::from_secs(1);
        assert!(elapsed_at_least(2_000_000_000, 1_000_000_000, second));
        assert!(!elapsed_at_least(1_999_999_000, 1_000_000_000, second));
        // Clock going backwards never counts as elapsed
        assert!(!elapsed_at_least(0, 1_000_000_000, second));
    }
}
