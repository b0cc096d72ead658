//! Metrics definitions for the Room Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by closed enums in code:
//! - `outcome`: granted, pending, denied, duplicate
//! - `event`: the nine server event names
//! - `reason`: full, closed (delivery); host, timeout, host-left, room-full
//!   (denials)
//! - `actor_type`: controller, room, connection
//!
//! Room and connection identifiers are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Pending-wait buckets
/// span seconds to minutes since a request can wait up to the pending
/// timeout; membership buckets span seconds to hours.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("rc_pending_wait_seconds".to_string()),
            &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )
        .map_err(|e| format!("Failed to set pending wait buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("rc_membership_duration_seconds".to_string()),
            &[10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0],
        )
        .map_err(|e| format!("Failed to set membership duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Connection Metrics (Gauges)
// ============================================================================

/// Set the number of active room actors.
///
/// Metric: `rc_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_rooms_active").set(count as f64);
}

/// Set the number of live connection actors (members plus pending).
///
/// Metric: `rc_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_connections_active").set(count as f64);
}

// ============================================================================
// Admission & Relay Metrics (Counters)
// ============================================================================

/// Record the outcome of a join or entry decision.
///
/// Metric: `rc_admissions_total`
/// Labels: `outcome`
pub fn record_admission(outcome: &'static str) {
    counter!("rc_admissions_total", "outcome" => outcome).increment(1);
}

/// Record an event handed to a connection actor.
///
/// Metric: `rc_events_relayed_total`
/// Labels: `event`
pub fn record_event_relayed(event: &'static str) {
    counter!("rc_events_relayed_total", "event" => event).increment(1);
}

/// Record an event that could not be delivered.
///
/// Metric: `rc_delivery_failures_total`
/// Labels: `reason` (full, closed)
///
/// Delivery is fire-and-forget; this counter is the only trace of a drop.
pub fn record_delivery_failure(reason: &'static str) {
    counter!("rc_delivery_failures_total", "reason" => reason).increment(1);
}

/// Record an entry request that was refused.
///
/// Metric: `rc_entry_denials_total`
/// Labels: `reason` (host, timeout, host-left, room-full)
pub fn record_entry_denied(reason: &'static str) {
    counter!("rc_entry_denials_total", "reason" => reason).increment(1);
}

/// Record an actor panic event.
///
/// Metric: `rc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &'static str) {
    counter!("rc_actor_panics_total", "actor_type" => actor_type).increment(1);
}

// ============================================================================
// Latency Metrics (Histograms)
// ============================================================================

/// Record how long an entry request waited before it was resolved.
///
/// Metric: `rc_pending_wait_seconds`
pub fn record_pending_wait(duration: Duration) {
    histogram!("rc_pending_wait_seconds").record(duration.as_secs_f64());
}

/// Record how long a member stayed in a room, from admission to departure.
///
/// Metric: `rc_membership_duration_seconds`
pub fn record_membership_duration(duration: Duration) {
    histogram!("rc_membership_duration_seconds").record(duration.as_secs_f64());
}
