//! Rolling inference latency statistics for one session.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Summary statistics over recorded latency samples (milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub count: usize,
}

/// Append-only collection of latency samples in arrival order.
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: Vec<f64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one inference duration. Non-finite values are ignored.
    pub fn record(&mut self, ms: f64) {
        if ms.is_finite() {
            self.samples.push(ms.max(0.0));
        } else {
            tracing::warn!(value = ms, "ignoring non-finite latency sample");
        }
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Summarise the recorded samples. An empty tracker yields all zeros.
    pub fn summary(&self) -> LatencySummary {
        summarize(&self.samples)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Compute a [`LatencySummary`] for an arbitrary sample set.
pub fn summarize(samples: &[f64]) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    LatencySummary {
        mean_ms: samples.mean(),
        median_ms: percentile(&sorted, 50.0),
        min_ms: samples.min(),
        max_ms: samples.max(),
        p95_ms: percentile(&sorted, 95.0),
        p99_ms: percentile(&sorted, 99.0),
        count: samples.len(),
    }
}

/// Linear-interpolation percentile over an ascending, non-empty slice.
///
/// The rank is `p/100 * (n - 1)`; values between ranks are interpolated.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary_is_zero() {
        let tracker = LatencyTracker::new();
        let summary = tracker.summary();
        assert_eq!(summary, LatencySummary::default());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.p99_ms, 0.0);
    }

    #[test]
    fn test_summary_basic() {
        let mut tracker = LatencyTracker::new();
        for ms in [4.0, 1.0, 3.0, 2.0] {
            tracker.record(ms);
        }
        let summary = tracker.summary();
        assert_eq!(summary.count, 4);
        assert!((summary.mean_ms - 2.5).abs() < 1e-9);
        assert!((summary.median_ms - 2.5).abs() < 1e-9);
        assert_eq!(summary.min_ms, 1.0);
        assert_eq!(summary.max_ms, 4.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        // rank = 0.95 * 9 = 8.55 -> 9 + 0.55
        assert!((percentile(&sorted, 95.0) - 9.55).abs() < 1e-9);
        assert!((percentile(&sorted, 99.0) - 9.91).abs() < 1e-9);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 10.0);
    }

    #[test]
    fn test_single_sample() {
        let mut tracker = LatencyTracker::new();
        tracker.record(7.5);
        let summary = tracker.summary();
        assert_eq!(summary.median_ms, 7.5);
        assert_eq!(summary.p95_ms, 7.5);
        assert_eq!(summary.min_ms, 7.5);
    }

    #[test]
    fn test_reset_and_non_finite() {
        let mut tracker = LatencyTracker::new();
        tracker.record(f64::NAN);
        tracker.record(f64::INFINITY);
        assert_eq!(tracker.count(), 0);
        tracker.record(1.0);
        tracker.reset();
        assert_eq!(tracker.summary().count, 0);
    }
}
