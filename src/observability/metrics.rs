//! Metrics collection and exposition.
//!
//! # Metrics
//! - `voter_auth_requests_total` (counter): requests by method, status
//! - `voter_auth_request_duration_seconds` (histogram): latency distribution
//! - `voter_auth_wallets_provisioned_total` (counter): provisions by outcome
//! - `voter_auth_provisioning_in_flight` (gauge): provisions holding a permit
//! - `voter_auth_funding_transfers_total` (counter): funder transfers by outcome
//! - `voter_auth_ledger_ops_total` (counter): ledger operations by op, outcome
//! - `voter_auth_rpc_health` (gauge): 1=healthy, 0=unhealthy

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "voter_auth_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("voter_auth_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_provision(outcome: &'static str) {
    counter!("voter_auth_wallets_provisioned_total", "outcome" => outcome).increment(1);
}

pub fn record_provisioning_in_flight(count: usize) {
    gauge!("voter_auth_provisioning_in_flight").set(count as f64);
}

pub fn record_funding_transfer(outcome: &'static str) {
    counter!("voter_auth_funding_transfers_total", "outcome" => outcome).increment(1);
}

pub fn record_ledger_op(op: &'static str, ok: bool) {
    counter!(
        "voter_auth_ledger_ops_total",
        "op" => op,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_rpc_health(healthy: bool) {
    gauge!("voter_auth_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
