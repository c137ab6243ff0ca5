// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the forwarder.
//!
//! Uses the `metrics` crate facade; the embedding process installs whatever
//! exporter it wants (Prometheus, OTEL, ...). Without a recorder every call
//! is a no-op.
//!
//! # Metric Naming Convention
//! - `forwarder_` prefix for all metrics
//! - `_total` suffix for counters
//!
//! # Labels
//! - `kind`: fix, heartbeat
//! - `reason`: capacity, reachable, age, shutdown
//! - `target`: collector, store, memory
//! - `status`: success, failed, empty

use metrics::{counter, gauge};

/// Record a sample entering the memory buffer
pub fn record_sample(kind: &str) {
    counter!("forwarder_samples_total", "kind" => kind.to_string()).increment(1);
}

/// Record a buffer flush and where the batch ended up
pub fn record_flush(reason: &str, target: &str, count: usize) {
    counter!(
        "forwarder_flush_total",
        "reason" => reason.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    counter!(
        "forwarder_flushed_samples_total",
        "target" => target.to_string()
    )
    .increment(count as u64);
}

/// Record samples acknowledged by the collector
pub fn record_delivered(count: usize) {
    counter!("forwarder_delivered_total").increment(count as u64);
}

/// Record a classified delivery failure
pub fn record_delivery_error(error_type: &str) {
    counter!(
        "forwarder_delivery_errors_total",
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record samples written to the local store
pub fn record_persisted(count: usize) {
    counter!("forwarder_persisted_total").increment(count as u64);
}

/// Record a failed local store write
pub fn record_storage_error(operation: &str) {
    counter!(
        "forwarder_storage_errors_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a backlog resync attempt
pub fn record_resync(status: &str, count: usize) {
    counter!("forwarder_resync_total", "status" => status.to_string()).increment(1);
    if status == "success" {
        counter!("forwarder_resynced_samples_total").increment(count as u64);
    }
}

/// Record a cycle that ended in an error and cooldown
pub fn record_cycle_error() {
    counter!("forwarder_cycle_errors_total").increment(1);
}

/// Set the number of samples held in memory
pub fn set_buffer_samples(count: usize) {
    gauge!("forwarder_buffer_samples").set(count as f64);
}

/// Set the number of samples waiting in the local store
pub fn set_backlog_samples(count: u64) {
    gauge!("forwarder_backlog_samples").set(count as f64);
}

/// Set collector reachability (1 = reachable)
pub fn set_reachable(reachable: bool) {
    gauge!("forwarder_collector_reachable").set(if reachable { 1.0 } else { 0.0 });
}
