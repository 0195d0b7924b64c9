//! Smoothed round-trip estimate.

use std::time::Duration;

use log::debug;

/// Running round-trip average.
///
/// A plain mean over the first `window` samples, then a moving average that
/// weights each new sample by `1 / (window + 1)`.
#[derive(Debug, Clone)]
pub struct PingEstimator {
    window: u32,
    threshold: Duration,
    estimate_nanos: u128,
    samples: u32,
}

impl PingEstimator {
    /// `threshold` is the per-sample change above which the estimate is logged.
    #[must_use]
    pub const fn new(window: u32, threshold: Duration) -> Self {
        Self {
            window,
            threshold,
            estimate_nanos: 0,
            samples: 0,
        }
    }

    /// Folds in one sample and returns the new estimate.
    pub fn record(&mut self, round_trip: Duration) -> Duration {
        let sample = round_trip.as_nanos();
        let weight = u128::from(self.samples);
        let next = (sample + self.estimate_nanos * weight) / (weight + 1);
        let moved = next.abs_diff(self.estimate_nanos);

        self.estimate_nanos = next;
        self.samples = self.samples.saturating_add(1).min(self.window);

        let estimate = self.estimate();
        if moved > self.threshold.as_nanos() {
            debug!(
                "ping estimate now {:.3} ms",
                estimate.as_secs_f64() * 1000.0
            );
        }
        estimate
    }

    #[must_use]
    pub fn estimate(&self) -> Duration {
        Duration::from_nanos(u64::try_from(self.estimate_nanos).unwrap_or(u64::MAX))
    }

    /// Samples currently weighting the average, at most the window size.
    #[must_use]
    pub const fn sample_count(&self) -> u32 {
        self.samples
    }
}
