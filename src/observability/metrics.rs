//! Metrics collection and exposition.
//!
//! # Metrics
//! - `render_requests_total` (counter): requests by outcome
//!   (hit, miss, not_modified, error, not_found)
//! - `render_duration_seconds` (histogram): time to first response byte decision
//! - `render_cache_entries` (gauge): cached pages
//! - `render_cache_fill_bytes` (histogram): size of stored payloads
//! - `render_cache_fill_abandoned_total` (counter): fills given up, by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and listens on its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished dispatch decision.
pub fn record_render(outcome: &'static str, start: Instant) {
    counter!("render_requests_total", "outcome" => outcome).increment(1);
    histogram!("render_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_size(entries: usize) {
    gauge!("render_cache_entries").set(entries as f64);
}

pub fn record_cache_fill(bytes: usize) {
    histogram!("render_cache_fill_bytes").record(bytes as f64);
}

pub fn record_cache_fill_abandoned(reason: &'static str) {
    counter!("render_cache_fill_abandoned_total", "reason" => reason).increment(1);
}
