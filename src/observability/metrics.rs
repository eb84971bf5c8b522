//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define origin metrics (request counts, latency, reloads, routes)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `origin_requests_total` (counter): requests by method, status, tenant
//! - `origin_request_duration_seconds` (histogram): latency by method
//! - `origin_reloads_total` (counter): reload triggers by trigger, outcome
//! - `origin_routes` (gauge): indexed routes per directory
//!
//! # Design Decisions
//! - Metric updates are cheap atomic operations; recording never fails
//!   the request path
//! - The exporter runs its own listener, separate from the origin
//!   listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own address. Failure is
/// logged; the origin serves without metrics rather than not at all.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_counter!(
                "origin_requests_total",
                "Requests handled, by method, status and tenant"
            );
            describe_histogram!(
                "origin_request_duration_seconds",
                "Request handling latency, by method"
            );
            describe_counter!(
                "origin_reloads_total",
                "Reload triggers, by trigger kind and outcome"
            );
            describe_gauge!("origin_routes", "Indexed routes per tenant directory");
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install metrics exporter");
        }
    }
}

/// Record one handled request on every exit path of the dispatcher.
pub fn record_request(method: &str, status: u16, tenant: &str, start_time: Instant) {
    counter!(
        "origin_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "tenant" => tenant.to_string()
    )
    .increment(1);
    histogram!(
        "origin_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}

pub fn record_reload(trigger: &'static str, outcome: &'static str) {
    counter!(
        "origin_reloads_total",
        "trigger" => trigger,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_routes(directory: &str, count: usize) {
    gauge!("origin_routes", "directory" => directory.to_string()).set(count as f64);
}
