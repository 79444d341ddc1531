use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::connection_manager::ConnectionRegistry;
use crate::error::RelayError;
use crate::metrics::{ConnectionMetrics, RelayMetrics};
use crate::websocket::{OutboundMessage, ServerMessage};

use super::{Envelope, RelayEvent};

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Recipients whose queue accepted the message
    pub delivered: usize,
    /// Recipients that could not take it
    pub failed: usize,
}

/// Statistics for the relay dispatcher
#[derive(Debug, Default)]
pub struct RelayStats {
    pub joins: AtomicU64,
    pub rejected_joins: AtomicU64,
    pub messages_relayed: AtomicU64,
    pub deliveries: AtomicU64,
    pub failed_deliveries: AtomicU64,
    pub dropped_events: AtomicU64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            joins: self.joins.load(Ordering::Relaxed),
            rejected_joins: self.rejected_joins.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatsSnapshot {
    pub joins: u64,
    pub rejected_joins: u64,
    pub messages_relayed: u64,
    pub deliveries: u64,
    pub failed_deliveries: u64,
    pub dropped_events: u64,
}

/// Applies connection events to the registry and fans messages out to rooms
pub struct RelayDispatcher {
    registry: Arc<ConnectionRegistry>,
    stats: RelayStats,
}

impl RelayDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: RelayStats::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch one typed event from a connection
    pub async fn handle_event(&self, connection_id: Uuid, event: RelayEvent) {
        match event {
            RelayEvent::Join { room } => {
                self.join(connection_id, &room).await;
            }
            RelayEvent::Message(envelope) => {
                self.relay(connection_id, &envelope);
            }
            RelayEvent::Disconnect => {
                self.disconnect(connection_id).await;
            }
        }
    }

    /// Join a room; returns whether the connection is now a member.
    ///
    /// An empty room name is dropped, and a connection that has already gone
    /// away is ignored.
    pub async fn join(&self, connection_id: Uuid, room: &str) -> bool {
        if room.is_empty() {
            self.reject(connection_id, &RelayError::InvalidRoom(room.to_string()));
            self.stats.rejected_joins.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        match self.registry.join(connection_id, room).await {
            Ok(joined) => {
                if joined {
                    self.stats.joins.fetch_add(1, Ordering::Relaxed);
                    RelayMetrics::record_join();
                    ConnectionMetrics::set_rooms_active(self.registry.room_count());
                }
                true
            }
            Err(e) => {
                // Raced with disconnect
                tracing::debug!(connection_id = %connection_id, room = %room, error = %e, "Join ignored");
                self.stats.rejected_joins.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Send an envelope to every member of its room except the sender.
    ///
    /// Each recipient is independent: a full or closed peer counts as failed
    /// and the rest still receive the message. A sender that is no longer
    /// registered delivers nothing.
    #[tracing::instrument(
        name = "relay.message",
        skip(self, envelope),
        fields(room = %envelope.room())
    )]
    pub fn relay(&self, sender_id: Uuid, envelope: &Envelope) -> DeliveryResult {
        if self.registry.get_connection(sender_id).is_none() {
            // Raced with disconnect
            tracing::debug!(sender_id = %sender_id, "Message from unknown connection ignored");
            return DeliveryResult::default();
        }

        if envelope.room().is_empty() {
            self.reject(sender_id, &RelayError::InvalidRoom(String::new()));
            return DeliveryResult::default();
        }

        let recipients: Vec<_> = self
            .registry
            .room_connections(envelope.room())
            .into_iter()
            .filter(|conn| conn.id != sender_id)
            .collect();

        if recipients.is_empty() {
            tracing::debug!(sender_id = %sender_id, "No other members in room");
            return DeliveryResult::default();
        }

        let message = ServerMessage::relay(envelope);
        let outbound = match OutboundMessage::preserialized(&message) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to pre-serialize message, falling back to per-connection serialization");
                OutboundMessage::Raw(message)
            }
        };

        let mut result = DeliveryResult::default();
        for conn in &recipients {
            match conn.try_send(outbound.clone()) {
                Ok(()) => result.delivered += 1,
                Err(e) => {
                    result.failed += 1;
                    if let RelayError::SendFailed { reason, .. } = &e {
                        RelayMetrics::record_send_failure(*reason);
                    }
                    tracing::debug!(error = %e, "Dropped delivery to one recipient");
                }
            }
        }

        self.stats.messages_relayed.fetch_add(1, Ordering::Relaxed);
        self.stats.deliveries.fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.stats.failed_deliveries.fetch_add(result.failed as u64, Ordering::Relaxed);
        RelayMetrics::record_relayed(result.delivered as u64);

        tracing::debug!(
            sender_id = %sender_id,
            delivered = result.delivered,
            failed = result.failed,
            "Relayed message"
        );

        result
    }

    /// Forget a connection. Other room members are not notified.
    pub async fn disconnect(&self, connection_id: Uuid) {
        if self.registry.unregister(connection_id).await {
            ConnectionMetrics::set_rooms_active(self.registry.room_count());
        }
    }

    /// Record an event that is dropped without effect
    pub fn reject(&self, connection_id: Uuid, error: &RelayError) {
        self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        RelayMetrics::record_dropped(error);
        tracing::warn!(
            connection_id = %connection_id,
            kind = error.kind(),
            error = %error,
            "Dropped inbound event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> RelayDispatcher {
        RelayDispatcher::new(Arc::new(ConnectionRegistry::new()))
    }

    fn envelope(room: &str) -> Envelope {
        Envelope::from_value(json!({"room": room, "text": "hi"})).unwrap()
    }

    #[tokio::test]
    async fn test_join_rejects_empty_room() {
        let dispatcher = setup();
        let (tx, _rx) = mpsc::channel(4);
        let handle = dispatcher.registry().register(tx);

        assert!(!dispatcher.join(handle.id, "").await);
        assert_eq!(dispatcher.registry().room_count(), 0);

        let stats = dispatcher.stats();
        assert_eq!(stats.rejected_joins, 1);
        assert_eq!(stats.dropped_events, 1);
        assert_eq!(stats.joins, 0);
    }

    #[tokio::test]
    async fn test_relay_skips_sender() {
        let dispatcher = setup();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = dispatcher.registry().register(tx_a);
        let b = dispatcher.registry().register(tx_b);
        dispatcher.join(a.id, "lobby").await;
        dispatcher.join(b.id, "lobby").await;

        let result = dispatcher.relay(a.id, &envelope("lobby"));
        assert_eq!(result, DeliveryResult { delivered: 1, failed: 0 });

        let received = rx_b.try_recv().unwrap().to_json().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&received).unwrap(),
            json!({"event": "message", "data": {"room": "lobby", "text": "hi"}})
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_isolates_failed_recipient() {
        let dispatcher = setup();
        let (tx_s, _rx_s) = mpsc::channel(4);
        let (tx_dead, rx_dead) = mpsc::channel(4);
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        let sender = dispatcher.registry().register(tx_s);
        let dead = dispatcher.registry().register(tx_dead);
        let ok = dispatcher.registry().register(tx_ok);
        for id in [sender.id, dead.id, ok.id] {
            dispatcher.join(id, "r").await;
        }
        drop(rx_dead);

        let result = dispatcher.relay(sender.id, &envelope("r"));
        assert_eq!(result, DeliveryResult { delivered: 1, failed: 1 });
        assert!(rx_ok.try_recv().is_ok());

        let stats = dispatcher.stats();
        assert_eq!(stats.messages_relayed, 1);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.failed_deliveries, 1);
    }

    #[tokio::test]
    async fn test_full_queue_does_not_stall_fanout() {
        let dispatcher = setup();
        let (tx_s, _rx_s) = mpsc::channel(4);
        let (tx_slow, _rx_slow) = mpsc::channel(1);
        let (tx_fast, mut rx_fast) = mpsc::channel(8);
        let sender = dispatcher.registry().register(tx_s);
        let slow = dispatcher.registry().register(tx_slow);
        let fast = dispatcher.registry().register(tx_fast);
        for id in [sender.id, slow.id, fast.id] {
            dispatcher.join(id, "r").await;
        }

        dispatcher.relay(sender.id, &envelope("r"));
        let second = dispatcher.relay(sender.id, &envelope("r"));

        assert_eq!(second, DeliveryResult { delivered: 1, failed: 1 });
        assert!(rx_fast.try_recv().is_ok());
        assert!(rx_fast.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_relay_to_empty_room_is_noop() {
        let dispatcher = setup();
        let (tx, _rx) = mpsc::channel(4);
        let sender = dispatcher.registry().register(tx);

        let result = dispatcher.relay(sender.id, &envelope("empty"));
        assert_eq!(result, DeliveryResult::default());
        assert_eq!(dispatcher.stats().messages_relayed, 0);
    }

    #[tokio::test]
    async fn test_relay_with_empty_room_is_dropped() {
        let dispatcher = setup();
        let (tx, _rx) = mpsc::channel(4);
        let sender = dispatcher.registry().register(tx);

        let result = dispatcher.relay(sender.id, &envelope(""));
        assert_eq!(result, DeliveryResult::default());
        assert_eq!(dispatcher.stats().dropped_events, 1);
    }

    #[tokio::test]
    async fn test_relay_from_unknown_sender_is_ignored() {
        let dispatcher = setup();
        let (tx, mut rx) = mpsc::channel(4);
        let member = dispatcher.registry().register(tx);
        dispatcher.join(member.id, "lobby").await;

        let result = dispatcher.relay(Uuid::new_v4(), &envelope("lobby"));
        assert_eq!(result, DeliveryResult::default());
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.stats().messages_relayed, 0);
    }

    #[tokio::test]
    async fn test_handle_event_disconnect() {
        let dispatcher = setup();
        let (tx, _rx) = mpsc::channel(4);
        let handle = dispatcher.registry().register(tx);

        dispatcher
            .handle_event(handle.id, RelayEvent::Join { room: "lobby".into() })
            .await;
        assert!(dispatcher.registry().members_of("lobby").contains(&handle.id));

        dispatcher.handle_event(handle.id, RelayEvent::Disconnect).await;
        assert!(dispatcher.registry().members_of("lobby").is_empty());
        assert!(dispatcher.registry().get_connection(handle.id).is_none());

        // Late join from the same connection is tolerated
        dispatcher
            .handle_event(handle.id, RelayEvent::Join { room: "lobby".into() })
            .await;
        assert!(dispatcher.registry().members_of("lobby").is_empty());
    }
}
