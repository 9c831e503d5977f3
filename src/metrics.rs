//! Prometheus metrics collection for Promptgate
//!
//! Tracks routing outcomes, auxiliary-call degradations, enhancement
//! verdicts, and end-to-end routing latency. Exposed via `/metrics` in
//! Prometheus text format.

use prometheus::{CounterVec, Encoder, HistogramOpts, Histogram, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector for Promptgate
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    requests_total: CounterVec,
    aux_degradations: CounterVec,
    enhancements: CounterVec,
    routing_duration: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance with its own registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g. duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counter: requests by routing outcome
        let requests_total = CounterVec::new(
            Opts::new(
                "promptgate_requests_total",
                "Total chat requests by routing outcome",
            ),
            &["outcome"],
        )?;

        // Counter: auxiliary calls that degraded to their fallback behavior
        let aux_degradations = CounterVec::new(
            Opts::new(
                "promptgate_aux_degradations_total",
                "Auxiliary calls (classifier/selector/enhancer/registry) that \
                 failed and degraded to identity behavior",
            ),
            &["component"],
        )?;

        // Counter: enhancement verdicts
        let enhancements = CounterVec::new(
            Opts::new(
                "promptgate_enhancements_total",
                "Prompt enhancement verdicts by outcome",
            ),
            &["verdict"],
        )?;

        // Histogram: end-to-end routing latency (classification through
        // truncation, excluding backend dispatch)
        let routing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "promptgate_routing_duration_ms",
                "Routing pipeline latency in milliseconds",
            )
            .buckets(vec![
                1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
            ]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(aux_degradations.clone()))?;
        registry.register(Box::new(enhancements.clone()))?;
        registry.register(Box::new(routing_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            aux_degradations,
            enhancements,
            routing_duration,
        })
    }

    /// Record a routed request.
    ///
    /// `outcome` is one of `bypass`, `passthrough`, `recommend`, `forward`.
    pub fn record_request(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    /// Record an auxiliary call that fell back to its degraded behavior.
    ///
    /// `component` is one of `classifier`, `selector`, `enhancer`,
    /// `registry`, `summarizer`.
    pub fn record_aux_degradation(&self, component: &str) {
        self.aux_degradations.with_label_values(&[component]).inc();
    }

    /// Record an enhancement verdict: `applied`, `rejected`, or `skipped`.
    pub fn record_enhancement(&self, verdict: &str) {
        self.enhancements.with_label_values(&[verdict]).inc();
    }

    /// Record routing pipeline latency.
    pub fn record_routing_duration(&self, duration_ms: f64) {
        self.routing_duration.observe(duration_ms);
    }

    /// Gather all metrics in Prometheus text format for the `/metrics`
    /// endpoint.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}
