//! Per-game derivation latency, recorded by the backfill workers and
//! reported in each batch summary.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Latency percentiles in microseconds. All None when nothing was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Percentiles {
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

/// Shared derivation latency histogram. Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<Option<Histogram<u64>>>,
}

impl LatencyStats {
    /// Tracks 1us to 100s, 3 significant figures. Bounds are constant, so a
    /// construction failure only disables recording.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Histogram::new_with_bounds(1, 100_000_000, 3).ok()),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(h) = guard.as_mut() {
                h.saturating_record(us.max(1));
            }
        }
    }

    pub fn percentiles(&self) -> Percentiles {
        let Ok(guard) = self.inner.lock() else {
            return Percentiles::default();
        };
        match guard.as_ref() {
            Some(h) if h.len() > 0 => Percentiles {
                p50_us: Some(h.value_at_quantile(0.5)),
                p95_us: Some(h.value_at_quantile(0.95)),
                p99_us: Some(h.value_at_quantile(0.99)),
            },
            _ => Percentiles::default(),
        }
    }

    pub fn len(&self) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|h| h.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all samples; called at the start of each batch.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(h) = guard.as_mut() {
                h.reset();
            }
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
