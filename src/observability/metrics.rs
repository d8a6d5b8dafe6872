//! Metrics collection and exposition.
//!
//! # Metrics
//! - `response_override_requests_total` (counter): responses passed through the
//!   engine, by instance and whether any rule applied
//! - `response_override_failures_total` (counter): fallback responses, by
//!   instance and failure kind (`capture`, `unsupported_mode`)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rewrite(instance: &str, applied: bool) {
    metrics::counter!(
        "response_override_requests_total",
        "instance" => instance.to_string(),
        "applied" => if applied { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_failure(instance: &str, kind: &'static str) {
    metrics::counter!(
        "response_override_failures_total",
        "instance" => instance.to_string(),
        "kind" => kind
    )
    .increment(1);
}
