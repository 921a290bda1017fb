//! HDR histogram of snapshot query latency. Every `DiscoveryQueryService` read
//! records into it; the query CLI prints the percentiles on request.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

impl LatencyStats {
    /// Tracks 1us to 100s at 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut h) = self.inner.lock() {
            // Out-of-range samples are saturated rather than dropped.
            h.saturating_record(us.max(1));
        }
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        let Ok(h) = self.inner.lock() else {
            return LatencyPercentiles { samples: 0, p50_us: None, p95_us: None, p99_us: None };
        };
        if h.len() == 0 {
            return LatencyPercentiles { samples: 0, p50_us: None, p95_us: None, p99_us: None };
        }
        LatencyPercentiles {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
        }
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert!(stats.is_empty());
        assert_eq!(stats.percentiles().p50_us, None);
    }

    #[test]
    fn percentiles_follow_samples() {
        let stats = LatencyStats::new();
        for us in 1..=100u64 {
            stats.record(Duration::from_micros(us));
        }
        let p = stats.percentiles();
        assert_eq!(p.samples, 100);
        assert_eq!(p.p50_us, Some(50));
        assert!(p.p99_us.unwrap() >= 99);
    }

    #[test]
    fn zero_duration_is_recorded() {
        let stats = LatencyStats::new();
        stats.record(Duration::ZERO);
        assert_eq!(stats.len(), 1);
    }
}
