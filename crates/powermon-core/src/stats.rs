//! Display windows and summary statistics over scrolling buffers

use crate::buffer::{Sample, ScrollingBuffer};

/// History span shown on the time-domain plots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayWindow {
    /// Last 5 minutes
    #[default]
    Short,
    /// Last hour
    Mid,
    /// Last day
    Long,
}

impl DisplayWindow {
    pub const ALL: [Self; 3] = [Self::Short, Self::Mid, Self::Long];

    /// Get a short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::Short => "5m",
            Self::Mid => "1h",
            Self::Long => "1d",
        }
    }

    /// Get the duration of this window in seconds
    pub const fn duration_secs(self) -> u32 {
        match self {
            Self::Short => 300,
            Self::Mid => 3600,
            Self::Long => 86400,
        }
    }

    /// X axis limits ending at `now_s`
    pub fn x_limits(self, now_s: f64) -> (f64, f64) {
        (now_s - self.duration_secs() as f64, now_s)
    }
}

/// Statistics for a time window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    /// Newest value in the window
    pub last: f64,
    /// Number of samples
    pub count: usize,
}

impl WindowStats {
    /// Reduce samples in chronological order. `None` when empty.
    pub fn from_samples<'a, I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let mut samples = samples.into_iter();
        let first = samples.next()?.value;

        let mut stats = Self {
            avg: 0.0,
            min: first,
            max: first,
            last: first,
            count: 1,
        };
        let mut sum = first;

        for sample in samples {
            sum += sample.value;
            stats.min = stats.min.min(sample.value);
            stats.max = stats.max.max(sample.value);
            stats.last = sample.value;
            stats.count += 1;
        }

        stats.avg = sum / stats.count as f64;
        Some(stats)
    }

    /// Statistics of the samples of `buffer` that fall inside `window` at `now_s`
    pub fn over(buffer: &ScrollingBuffer, window: DisplayWindow, now_s: f64) -> Option<Self> {
        let (start, end) = window.x_limits(now_s);
        Self::from_samples(
            buffer
                .iter()
                .filter(|sample| sample.timestamp >= start && sample.timestamp <= end),
        )
    }

    /// Y axis limits with `margin` of the range added on both sides.
    /// A flat signal is padded relative to its magnitude instead.
    pub fn y_limits(&self, margin: f64) -> (f64, f64) {
        let range = self.max - self.min;
        let pad = if range > 0.0 {
            range * margin
        } else {
            let magnitude = if self.max < 0.0 { -self.max } else { self.max };
            magnitude.max(1.0) * margin
        };
        (self.min - pad, self.max + pad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(points: &[(f64, f64)]) -> ScrollingBuffer {
        let mut buffer = ScrollingBuffer::new("P@100Hz", 16).unwrap();
        for &(t, v) in points {
            buffer.push(Sample::new(t, v));
        }
        buffer
    }

    #[test]
    fn test_window_durations() {
        let secs: Vec<u32> = DisplayWindow::ALL.iter().map(|w| w.duration_secs()).collect();
        assert_eq!(secs, vec![300, 3600, 86400]);
        assert_eq!(DisplayWindow::default(), DisplayWindow::Short);
        assert_eq!(DisplayWindow::Mid.x_limits(4000.0), (400.0, 4000.0));
    }

    #[test]
    fn test_stats_over_window() {
        let buffer = buffer(&[(0.0, 100.0), (800.0, 2.0), (900.0, 6.0), (1000.0, 4.0)]);

        let stats = WindowStats::over(&buffer, DisplayWindow::Short, 1000.0).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.avg, 4.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 6.0);
        assert_eq!(stats.last, 4.0);

        let all = WindowStats::over(&buffer, DisplayWindow::Mid, 1000.0).unwrap();
        assert_eq!(all.count, 4);
        assert_eq!(all.max, 100.0);
    }

    #[test]
    fn test_stats_follow_ring_order() {
        let mut ring = ScrollingBuffer::new("S@100Hz", 2).unwrap();
        for (t, v) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)] {
            ring.push(Sample::new(t, v));
        }

        let stats = WindowStats::over(&ring, DisplayWindow::Short, 3.0).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.last, 3.0);
        assert_eq!(stats.min, 2.0);
    }

    #[test]
    fn test_empty_window() {
        let buffer = buffer(&[(0.0, 1.0)]);
        assert!(WindowStats::over(&buffer, DisplayWindow::Short, 10_000.0).is_none());
        assert!(WindowStats::from_samples(&[] as &[Sample]).is_none());
    }

    #[test]
    fn test_y_limits() {
        let stats = WindowStats::from_samples(&[Sample::new(0.0, 10.0), Sample::new(1.0, 20.0)])
            .unwrap();
        assert_eq!(stats.y_limits(0.1), (9.0, 21.0));

        let flat = WindowStats::from_samples(&[Sample::new(0.0, 5.0)]).unwrap();
        let (lo, hi) = flat.y_limits(0.1);
        assert!(lo < 5.0 && hi > 5.0);
    }
}
