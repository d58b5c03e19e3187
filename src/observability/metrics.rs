//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sync_fetches_total` (counter): reads issued, by resource
//! - `sync_outcomes_total` (counter): fetch outcomes by resource and
//!   disposition (`applied`, `error`, `stale`)
//! - `sync_bindings_active` (gauge): live bindings
//! - `sync_listener_events_total` (counter): invalidation events delivered
//! - `sync_actions_total` (counter): imperative actions by outcome
//! - `sync_rpc_health` (gauge): 1=reachable, 0=unreachable
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op, so the engine can
//!   record unconditionally
//! - Prometheus exporter is opt-in via config

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_fetch(resource: &'static str) {
    counter!("sync_fetches_total", "resource" => resource).increment(1);
}

pub fn record_outcome(resource: &'static str, disposition: &'static str) {
    counter!("sync_outcomes_total", "resource" => resource, "disposition" => disposition)
        .increment(1);
}

pub fn record_binding_started() {
    gauge!("sync_bindings_active").increment(1.0);
}

pub fn record_binding_stopped() {
    gauge!("sync_bindings_active").decrement(1.0);
}

pub fn record_listener_event(kind: &'static str) {
    counter!("sync_listener_events_total", "kind" => kind).increment(1);
}

pub fn record_action(action: &'static str, outcome: &'static str) {
    counter!("sync_actions_total", "action" => action, "outcome" => outcome).increment(1);
}

pub fn record_rpc_health(healthy: bool) {
    gauge!("sync_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
