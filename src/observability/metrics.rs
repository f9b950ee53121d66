//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define client lifecycle metrics (logins, destroys, timers, latency)
//! - Expose a Prometheus-compatible endpoint when asked to
//!
//! # Metrics
//! - `gateway_client_logins_total` (counter): login outcomes by `outcome`
//! - `gateway_client_destroys_total` (counter): completed destroy calls
//! - `gateway_client_timers_active` (gauge): live client timers
//! - `gateway_client_latency_ms` (histogram): heartbeat round trips
//! - `gateway_client_gateway_resolutions_total` (counter): resolutions by `source`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of a login attempt (`ready`, `failed`, `rejected`).
pub fn record_login(outcome: &'static str) {
    metrics::counter!("gateway_client_logins_total", "outcome" => outcome).increment(1);
}

/// Record a completed destroy.
pub fn record_destroy() {
    metrics::counter!("gateway_client_destroys_total").increment(1);
}

/// Record the number of live client timers.
pub fn record_active_timers(count: usize) {
    metrics::gauge!("gateway_client_timers_active").set(count as f64);
}

/// Record one heartbeat round trip.
pub fn record_latency(sample_ms: u64) {
    metrics::histogram!("gateway_client_latency_ms").record(sample_ms as f64);
}

/// Record where a gateway address came from (`cache`, `fresh`, `reuse_check`).
pub fn record_gateway_resolution(source: &'static str) {
    metrics::counter!("gateway_client_gateway_resolutions_total", "source" => source).increment(1);
}
