use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Process-wide observability state for the limiter.
///
/// Owns its own registry and is handed to the algorithms as an `Arc`
/// capability rather than looked up through a global, so tests can register
/// a fresh instance and read the counters back.
pub struct Metrics {
    registry: Registry,
    /// Checks that came back allowed, labelled by algorithm.
    pub requests_allowed: IntCounterVec,
    /// Checks that came back blocked, labelled by algorithm.
    pub requests_blocked: IntCounterVec,
    /// Store failures that triggered fail-open. A spike here means the
    /// store is having issues.
    pub store_errors: IntCounter,
    /// Store round-trip latency in milliseconds. Most operations should be
    /// under 1ms; the per-operation timeout caps the tail.
    pub store_latency: Histogram,
    /// End-to-end check latency in milliseconds, labelled by algorithm.
    pub check_latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_allowed = IntCounterVec::new(
            Opts::new(
                "requests_allowed_total",
                "Total number of requests allowed through the rate limiter",
            ),
            &["algorithm"],
        )?;

        let requests_blocked = IntCounterVec::new(
            Opts::new(
                "requests_blocked_total",
                "Total number of requests blocked by the rate limiter",
            ),
            &["algorithm"],
        )?;

        let store_errors = IntCounter::new(
            "store_errors_total",
            "Total number of store errors that triggered fail-open",
        )?;

        let store_latency = Histogram::with_opts(
            HistogramOpts::new("store_latency_ms", "Store operation latency in milliseconds")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;

        let check_latency = HistogramVec::new(
            HistogramOpts::new("check_latency_ms", "Rate limit check latency in milliseconds")
                .buckets(vec![0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 25.0, 50.0]),
            &["algorithm"],
        )?;

        registry.register(Box::new(requests_allowed.clone()))?;
        registry.register(Box::new(requests_blocked.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;
        registry.register(Box::new(store_latency.clone()))?;
        registry.register(Box::new(check_latency.clone()))?;

        Ok(Self {
            registry,
            requests_allowed,
            requests_blocked,
            store_errors,
            store_latency,
            check_latency,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
