//! Latency recording for engine calls.
//!
//! The predictor is handed a [`LatencySink`] at construction; nothing in the
//! crate records into global state. [`LatencyRecorder`] is the stock sink,
//! a `prometheus` histogram in microseconds that the host can register into
//! its own registry.

use prometheus::{Histogram, HistogramOpts, Registry};

use crate::error::{Result, ServingError};

/// Default metric name for engine call latency.
pub const DEFAULT_LATENCY_METRIC: &str = "gbdt_predict_latency_us";

/// Receives one duration sample per engine call.
pub trait LatencySink: Send + Sync {
    /// Record a sample in microseconds.
    fn record_micros(&self, micros: u64);
}

/// Sink that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLatencySink;

impl LatencySink for NoopLatencySink {
    fn record_micros(&self, _micros: u64) {}
}

/// Histogram-backed latency recorder.
#[derive(Debug, Clone)]
pub struct LatencyRecorder {
    histogram: Histogram,
}

impl LatencyRecorder {
    /// Create a recorder with exponential buckets from 10us to ~5s.
    pub fn new(name: &str) -> Result<Self> {
        let buckets = prometheus::exponential_buckets(10.0, 2.0, 20).map_err(metrics_error)?;
        let opts = HistogramOpts::new(name, "Wall-clock time of batched engine calls in microseconds")
            .buckets(buckets);
        let histogram = Histogram::with_opts(opts).map_err(metrics_error)?;
        Ok(Self { histogram })
    }

    /// Register the histogram into `registry` so it gets exported.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.histogram.clone()))
            .map_err(metrics_error)
    }

    /// Number of recorded samples.
    pub fn count(&self) -> u64 {
        self.histogram.get_sample_count()
    }

    /// Sum of recorded samples in microseconds.
    pub fn sum_micros(&self) -> f64 {
        self.histogram.get_sample_sum()
    }

    /// Mean sample, `None` before the first sample.
    pub fn mean_micros(&self) -> Option<f64> {
        match self.count() {
            0 => None,
            n => Some(self.sum_micros() / n as f64),
        }
    }
}

impl LatencySink for LatencyRecorder {
    fn record_micros(&self, micros: u64) {
        self.histogram.observe(micros as f64);
    }
}

fn metrics_error(e: prometheus::Error) -> ServingError {
    ServingError::internal(format!("latency metric: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_aggregates_samples() {
        let recorder = LatencyRecorder::new(DEFAULT_LATENCY_METRIC).unwrap();
        assert_eq!(recorder.mean_micros(), None);
        recorder.record_micros(100);
        recorder.record_micros(300);
        assert_eq!(recorder.count(), 2);
        assert_eq!(recorder.sum_micros(), 400.0);
        assert_eq!(recorder.mean_micros(), Some(200.0));
    }

    #[test]
    fn recorder_exports_through_registry() {
        let registry = Registry::new();
        let recorder = LatencyRecorder::new("test_latency_us").unwrap();
        recorder.register(&registry).unwrap();
        recorder.record_micros(42);
        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "test_latency_us");
        assert!(recorder.register(&registry).is_err());
    }

    #[test]
    fn invalid_metric_name_is_internal_error() {
        let err = LatencyRecorder::new("not a metric").unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InternalError);
    }
}
