//! Prometheus metrics for the relay.
//!
//! - Connection metrics (opened, closed, active, duration)
//! - Room metrics (active rooms, joins)
//! - Relay metrics (messages relayed, deliveries, failures, dropped events)

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, RelayMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of live connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of live relay connections"
    ).unwrap();

    pub static ref CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total connections accepted"
    ).unwrap();

    pub static ref CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total connections closed"
    ).unwrap();

    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "Connection lifetime in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 14400.0]
    ).unwrap();

    // ============================================================================
    // Room Metrics
    // ============================================================================

    /// Rooms with at least one member
    pub static ref ROOMS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_rooms_active", METRIC_PREFIX),
        "Number of rooms with at least one member"
    ).unwrap();

    pub static ref ROOM_JOINS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_room_joins_total", METRIC_PREFIX),
        "Total accepted room joins"
    ).unwrap();

    // ============================================================================
    // Relay Metrics
    // ============================================================================

    pub static ref MESSAGES_RELAYED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_relayed_total", METRIC_PREFIX),
        "Total messages fanned out to a room"
    ).unwrap();

    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total per-recipient deliveries queued"
    ).unwrap();

    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Per-recipient deliveries that could not be queued",
        &["reason"]
    ).unwrap();

    /// Inbound events dropped before dispatch
    pub static ref EVENTS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_dropped_total", METRIC_PREFIX),
        "Inbound events dropped without effect",
        &["reason"]
    ).unwrap();
}
