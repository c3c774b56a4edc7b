//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): responses by status
//! - `gateway_rate_limited_total` (counter): denials by limiter
//! - `gateway_rate_limit_swept_total` (counter): expired records removed
//! - `gateway_csrf_minted_total` (counter): tokens issued
//! - `gateway_csrf_rejected_total` (counter): rejections by reason
//! - `gateway_session_relay_total` (counter): relay outcomes by event

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16) {
    counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    counter!("gateway_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_swept(removed: usize) {
    counter!("gateway_rate_limit_swept_total").increment(removed as u64);
}

pub fn record_csrf_minted() {
    counter!("gateway_csrf_minted_total").increment(1);
}

pub fn record_csrf_rejected(reason: &'static str) {
    counter!("gateway_csrf_rejected_total", "reason" => reason).increment(1);
}

pub fn record_relay(event: &'static str, outcome: &'static str) {
    counter!("gateway_session_relay_total", "event" => event, "outcome" => outcome).increment(1);
}
