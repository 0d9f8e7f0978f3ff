//! In-memory latency histogram for retailer page fetches.
//! Records wall time from request start to a fully read response body.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Upper bound of the histogram: ten minutes in milliseconds.
const MAX_TRACKABLE_MS: u64 = 600_000;

/// Shared fetch latency stats. Page fetchers record, API reads.
/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl LatencyStats {
    /// Tracks 1ms to 10 minutes, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, MAX_TRACKABLE_MS, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = (d.as_millis().min(u128::from(MAX_TRACKABLE_MS)) as u64).max(1);
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot::empty();
        };
        if h.len() == 0 {
            return LatencySnapshot::empty();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

impl LatencySnapshot {
    fn empty() -> Self {
        Self {
            samples: 0,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
            max_ms: None,
        }
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
        let snap = stats.snapshot();
        assert_eq!(snap.samples, 0);
        assert!(snap.p50_ms.is_none());
    }

    #[test]
    fn records_fetch_durations() {
        let stats = LatencyStats::new();
        for ms in [100, 200, 300, 400, 5_000] {
            stats.record(Duration::from_millis(ms));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.samples, 5);
        let p50 = snap.p50_ms.unwrap();
        assert!((295..=305).contains(&p50), "p50={p50}");
        assert!(snap.max_ms.unwrap() >= 4_990);
    }

    #[test]
    fn sub_millisecond_fetch_counts_as_one() {
        let stats = LatencyStats::new();
        stats.record(Duration::from_micros(10));
        assert_eq!(stats.snapshot().samples, 1);
    }
}
