//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_store_commits_total` (counter): successful commits by origin
//! - `config_store_version_mismatches_total` (counter): rejected stale commits/edits
//! - `config_store_implicit_rollbacks_total` (counter): one-shot edits discarded after a failure
//! - `config_store_open_transactions` (gauge): transactions currently registered
//! - `config_store_version` (gauge): current committed version
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users and tests pay nothing
//! - Exposition is a Prometheus listener started only when enabled

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::store::Origin;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_commit(origin: Origin, version: i64) {
    let origin = match origin {
        Origin::Explicit => "explicit",
        Origin::Implicit => "implicit",
    };
    metrics::counter!("config_store_commits_total", "origin" => origin).increment(1);
    record_version(version);
}

pub fn record_version(version: i64) {
    metrics::gauge!("config_store_version").set(version as f64);
}

pub fn record_version_mismatch() {
    metrics::counter!("config_store_version_mismatches_total").increment(1);
}

pub fn record_implicit_rollback() {
    metrics::counter!("config_store_implicit_rollbacks_total").increment(1);
}

pub fn record_open_transactions(count: usize) {
    metrics::gauge!("config_store_open_transactions").set(count as f64);
}
