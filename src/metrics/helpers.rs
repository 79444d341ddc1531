//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::error::{RelayError, SendFailure};

use super::{
    CONNECTIONS_ACTIVE, CONNECTIONS_CLOSED, CONNECTIONS_OPENED, CONNECTION_DURATION,
    DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL, EVENTS_DROPPED_TOTAL, MESSAGES_RELAYED_TOTAL,
    ROOMS_ACTIVE, ROOM_JOINS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        CONNECTIONS_OPENED.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        CONNECTIONS_CLOSED.inc();
        CONNECTION_DURATION.observe(duration_secs);
    }

    /// Sync the room gauge with the registry
    pub fn set_rooms_active(count: usize) {
        ROOMS_ACTIVE.set(count as i64);
    }

    /// Live connections are read from the registry, never counted here
    pub fn set_connections_active(count: usize) {
        CONNECTIONS_ACTIVE.set(count as i64);
    }
}

/// Helper struct for recording relay metrics
pub struct RelayMetrics;

impl RelayMetrics {
    pub fn record_join() {
        ROOM_JOINS_TOTAL.inc();
    }

    pub fn record_relayed(delivered: u64) {
        MESSAGES_RELAYED_TOTAL.inc();
        DELIVERIES_TOTAL.inc_by(delivered);
    }

    pub fn record_send_failure(reason: SendFailure) {
        let label = match reason {
            SendFailure::Backpressure => "backpressure",
            SendFailure::Closed => "closed",
        };
        DELIVERY_FAILURES_TOTAL.with_label_values(&[label]).inc();
    }

    pub fn record_dropped(error: &RelayError) {
        EVENTS_DROPPED_TOTAL.with_label_values(&[error.kind()]).inc();
    }
}
