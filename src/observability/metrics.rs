//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portal_requests_total` (counter): requests by method, status
//! - `portal_request_duration_seconds` (histogram): latency distribution
//! - `portal_rate_limited_total` (counter): gate rejections
//! - `portal_gate_decisions_total` (counter): pass / redirect / rate_limited
//! - `portal_upstream_errors_total` (counter): failed database calls by operation
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "portal_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("portal_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("portal_rate_limited_total").increment(1);
}

pub fn record_gate_decision(decision: &'static str) {
    metrics::counter!("portal_gate_decisions_total", "decision" => decision).increment(1);
}

pub fn record_upstream_error(operation: &'static str) {
    metrics::counter!("portal_upstream_errors_total", "operation" => operation).increment(1);
}
