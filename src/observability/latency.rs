//! Rolling round-trip latency window.
//!
//! Keeps the last [`WINDOW_SIZE`] heartbeat round trips. The average is the
//! ceiling of the mean, or `None` while nothing has been measured yet.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::observability::metrics;

/// Number of samples kept.
pub const WINDOW_SIZE: usize = 3;

/// Thread-safe latency window.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    samples: Mutex<VecDeque<u64>>,
}

impl LatencyTracker {
    /// Create a tracker with an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement in milliseconds, evicting the oldest past the window.
    pub fn record(&self, sample_ms: u64) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.push_back(sample_ms);
        while samples.len() > WINDOW_SIZE {
            samples.pop_front();
        }
        drop(samples);

        metrics::record_latency(sample_ms);
    }

    /// Ceiling of the mean of the current window.
    pub fn average(&self) -> Option<u64> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as u64;
        let sum: u64 = samples.iter().sum();
        Some(sum.div_ceil(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_has_no_average() {
        let tracker = LatencyTracker::new();
        assert_eq!(tracker.average(), None);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let tracker = LatencyTracker::new();
        for sample in [120, 95, 110, 200] {
            tracker.record(sample);
        }

        assert_eq!(tracker.average(), Some(135));

        tracker.record(50);
        assert_eq!(tracker.average(), Some(120));
    }

    #[test]
    fn test_average_rounds_up() {
        let tracker = LatencyTracker::new();
        tracker.record(10);
        tracker.record(11);
        assert_eq!(tracker.average(), Some(11));

        tracker.record(0);
        assert_eq!(tracker.average(), Some(7));
    }
}
