//! Metrics Surface — counters, gauges, and a latency histogram updated by
//! every other component, exposed as Prometheus text exposition format.
//!
//! Built on the `metrics` facade crate plus `metrics-exporter-prometheus`.
//! Rather than installing a standalone exporter with its own listener,
//! this gateway renders the exposition text itself from a
//! `PrometheusHandle` so it can be served from the `/metrics` route on
//! the same `axum` router as everything else.

use std::sync::OnceLock;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Passive registry: owns the Prometheus recorder handle used to render
/// `/metrics` text. Recording itself happens through the free functions
/// below, callable from anywhere without threading this struct through.
#[derive(Clone)]
pub struct MetricsSurface {
    handle: Option<PrometheusHandle>,
}

impl MetricsSurface {
    /// Install the global Prometheus recorder. Safe to call more than once
    /// per process (e.g. across tests or multiple `Gateway`s): the recorder
    /// itself installs only once, but every caller gets the same handle.
    pub fn install() -> Self {
        let handle = METRICS_HANDLE
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(h) => h,
                Err(e) => {
                    warn!(error = %e, "failed to install prometheus recorder");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            })
            .clone();
        MetricsSurface {
            handle: Some(handle),
        }
    }

    /// Render current metrics as Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

/// Record an admitted request (every `/analyze` call reaching the Admission
/// Controller, cache hit or miss alike).
pub fn record_request() {
    counter!("gateway_requests_total").increment(1);
}

/// Record a request that was enqueued onto the Work Queue (excludes cache
/// hits and rejections).
pub fn record_queued() {
    counter!("gateway_requests_queued_total").increment(1);
}

/// Record a cache hit at admission time.
pub fn record_cache_hit() {
    counter!("gateway_requests_cache_hit_total").increment(1);
}

/// Record a request reaching terminal `error` status.
pub fn record_error() {
    counter!("gateway_requests_errors_total").increment(1);
}

/// Update the queue-size gauge.
pub fn set_queue_size(size: usize) {
    gauge!("gateway_queue_size").set(size as f64);
}

/// Update the in-flight outbound-call gauge.
pub fn set_in_flight(count: usize) {
    gauge!("gateway_in_flight").set(count as f64);
}

/// Record per-item processing latency, from dequeue to terminal write.
pub fn record_latency_seconds(seconds: f64) {
    histogram!("gateway_processing_latency_seconds").record(seconds);
}
