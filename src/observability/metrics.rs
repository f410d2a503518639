//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, route, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_auth_rejections_total` (counter): guard rejections by reason
//! - `api_csrf_rejections_total` (counter): CSRF failures by reason
//! - `api_rate_limited_total` (counter): 429s by rule
//! - `api_emails_total` (counter): outbound email attempts by outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("api_requests_total", &labels).increment(1);
    histogram!("api_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!("api_auth_rejections_total", "reason" => reason).increment(1);
}

pub fn record_csrf_rejection(reason: &'static str) {
    counter!("api_csrf_rejections_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(rule: &str) {
    counter!("api_rate_limited_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_email(outcome: &'static str) {
    counter!("api_emails_total", "outcome" => outcome).increment(1);
}
