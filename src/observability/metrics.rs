//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_http_requests_total` (counter): requests by method, status
//! - `bridge_request_duration_seconds` (histogram): end-to-end latency
//! - `bridge_tickets_total` (counter): tickets by operation, outcome
//! - `bridge_ticket_duration_seconds` (histogram): submit-to-completion time
//! - `bridge_pending_tickets` (gauge): size of the pending table
//! - `bridge_module_reloads_total` (counter): modules processed by reload passes
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    ::metrics::counter!("bridge_http_requests_total", &labels).increment(1);
    ::metrics::histogram!("bridge_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_ticket(operation: &'static str, ok: bool, start: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    ::metrics::counter!("bridge_tickets_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("bridge_ticket_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_pending(count: usize) {
    ::metrics::gauge!("bridge_pending_tickets").set(count as f64);
}

pub fn record_reload(modules: usize) {
    ::metrics::counter!("bridge_module_reloads_total").increment(modules as u64);
}
