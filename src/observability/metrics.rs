//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by status and outcome
//! - `gateway_request_duration_seconds` (histogram): render + rewrite latency
//! - `gateway_nonces_issued_total` (counter): nonces generated
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter served on its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// How a request left the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered and rewritten.
    Rendered,
    /// Not an HTML page; passed through unmodified.
    Bypassed,
    /// Render engine had no match.
    NotFound,
    /// Render or rewrite failed.
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Rendered => "rendered",
            Outcome::Bypassed => "bypassed",
            Outcome::NotFound => "not_found",
            Outcome::Failed => "failed",
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, outcome: Outcome, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "status" => status.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "outcome" => outcome.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_nonce_issued() {
    metrics::counter!("gateway_nonces_issued_total").increment(1);
}
