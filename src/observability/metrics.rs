//! Metrics collection and exposition.
//!
//! # Metrics
//! - `session_intents_total` (counter): intents by name and outcome
//! - `session_funding_rounds_total` (counter): funding grants by outcome
//! - `session_transfers_total` (counter): transfers by outcome
//! - `session_ledger_health` (gauge): 1=reachable, 0=unreachable

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_intent(intent: &'static str, outcome: &'static str) {
    metrics::counter!("session_intents_total", "intent" => intent, "outcome" => outcome)
        .increment(1);
}

pub fn record_funding_round(outcome: &'static str) {
    metrics::counter!("session_funding_rounds_total", "outcome" => outcome).increment(1);
}

pub fn record_transfer(outcome: &'static str) {
    metrics::counter!("session_transfers_total", "outcome" => outcome).increment(1);
}

pub fn record_ledger_health(healthy: bool) {
    metrics::gauge!("session_ledger_health").set(if healthy { 1.0 } else { 0.0 });
}
