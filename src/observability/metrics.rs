//! Metrics collection and exposition.
//!
//! # Metrics
//! - `confstream_groups_emitted_total` (counter): groups per provider
//! - `confstream_functions_dispatched_total` (counter): inbound
//!   commands by name
//! - `confstream_functions_rejected_total` (counter): rejects by name

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Counters are recorded
/// whether or not the exporter is running.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics exporter"),
    }
}

pub fn record_discovery(provider: &str, groups: usize) {
    counter!("confstream_groups_emitted_total", "provider" => provider.to_string())
        .increment(groups as u64);
}

pub fn record_function(name: &str) {
    counter!("confstream_functions_dispatched_total", "function" => name.to_string())
        .increment(1);
}

pub fn record_reject(name: &str) {
    counter!("confstream_functions_rejected_total", "function" => name.to_string()).increment(1);
}
