//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webhook_requests_total` (counter): deliveries by outcome
//! - `webhook_request_duration_seconds` (histogram): handling latency by outcome
//! - `webhook_dispatch_total` (counter): trigger calls by status
//! - `webhook_dispatch_duration_seconds` (histogram): trigger call latency
//! - `webhook_gate_rate_windows` / `webhook_gate_replay_records` (gauges):
//!   live gate state, sampled at sweep time
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter, serving `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled delivery.
pub fn record_webhook(outcome: &'static str, start: Instant) {
    metrics::counter!("webhook_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("webhook_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one trigger call. `status` is `None` on transport failure.
pub fn record_dispatch(status: Option<u16>, start: Instant) {
    let status = status.map(|s| s.to_string()).unwrap_or_else(|| "error".to_string());
    metrics::counter!("webhook_dispatch_total", "status" => status).increment(1);
    metrics::histogram!("webhook_dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_gate_size(rate_windows: usize, replay_records: usize) {
    metrics::gauge!("webhook_gate_rate_windows").set(rate_windows as f64);
    metrics::gauge!("webhook_gate_replay_records").set(replay_records as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        let start = Instant::now();
        record_webhook("accepted", start);
        record_dispatch(Some(204), start);
        record_dispatch(None, start);
        record_gate_size(3, 7);
    }
}
