//! Metrics collection and exposition.
//!
//! # Metrics
//! - `serve_requests_total` (counter): requests by method, status, disposition
//! - `serve_request_duration_seconds` (histogram): handling latency
//! - `serve_etag_cache_entries` (gauge): memoized content hashes

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, disposition: &'static str, start: Instant) {
    counter!(
        "serve_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "disposition" => disposition
    )
    .increment(1);
    histogram!("serve_request_duration_seconds", "disposition" => disposition)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_etag_cache_size(entries: usize) {
    gauge!("serve_etag_cache_entries").set(entries as f64);
}
