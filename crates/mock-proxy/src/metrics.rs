//! Prometheus metrics for mock-proxy.
//!
//! Tracks replay/record outcomes, upstream latency and cache writes.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Total number of requests by method and outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mock_proxy_requests_total",
        "Total number of requests handled by the proxy",
        &["method", "outcome"]  // outcome: cache_hit|recorded|unmapped|upstream_error|...
    )
    .unwrap();

    /// Upstream request duration
    pub static ref UPSTREAM_REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mock_proxy_upstream_duration_ms",
        "Duration of upstream requests made on cache misses",
        &["method", "status"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Cache writes by result
    pub static ref CACHE_WRITES_TOTAL: CounterVec = register_counter_vec!(
        "mock_proxy_cache_writes_total",
        "Total number of attempted cache entry writes",
        &["result"]  // result: success|error
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(method: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

/// `status` is the upstream status code, or `error` for transport failures
pub fn record_upstream_duration(method: &str, status: &str, duration_ms: f64) {
    UPSTREAM_REQUEST_DURATION_MS
        .with_label_values(&[method, status])
        .observe(duration_ms);
}

pub fn record_cache_write(success: bool) {
    let result = if success { "success" } else { "error" };
    CACHE_WRITES_TOTAL.with_label_values(&[result]).inc();
}
