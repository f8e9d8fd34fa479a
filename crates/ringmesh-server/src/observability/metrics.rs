//! Prometheus Metrics
//!
//! Metrics tracked:
//! - `ringmesh_commands_total` - counter of handled commands by command and outcome
//! - `ringmesh_command_duration_seconds` - histogram of command handling times
//! - `ringmesh_notifications_total` - counter of notification deliveries by kind and outcome
//! - `ringmesh_registered_peers` - gauge of registered peers
//! - `ringmesh_free_peers` - gauge of peers not in any ring
//! - `ringmesh_ring_size` - gauge of active ring members (0 without a ring)

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metric_descriptions();
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!("ringmesh_commands_total", "Total commands handled");
    describe_histogram!(
        "ringmesh_command_duration_seconds",
        "Duration of command handling in seconds"
    );
    describe_counter!(
        "ringmesh_notifications_total",
        "Total notification deliveries attempted"
    );
    describe_gauge!("ringmesh_registered_peers", "Number of registered peers");
    describe_gauge!("ringmesh_free_peers", "Number of registered peers in no ring");
    describe_gauge!("ringmesh_ring_size", "Number of active ring members");
}

/// Record a handled command. `outcome` is `success`, `failure` or `unrecognized`.
pub fn record_command(command: &str, outcome: &str, duration: Duration) {
    counter!(
        "ringmesh_commands_total",
        "command" => command.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "ringmesh_command_duration_seconds",
        "command" => command.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_notification(kind: &str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(
        "ringmesh_notifications_total",
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Update the registry gauges after a mutation.
pub fn set_membership(registered: usize, free: usize, ring_size: usize) {
    gauge!("ringmesh_registered_peers").set(registered as f64);
    gauge!("ringmesh_free_peers").set(free as f64);
    gauge!("ringmesh_ring_size").set(ring_size as f64);
}
