use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::websocket::OutboundMessage;

use super::stats::{RegistryStats, RoomInfo};
use super::types::ConnectionHandle;

/// Owns every live connection and the room membership index.
///
/// Joins and unregisters of the same connection are serialized through the
/// handle's membership lock, so a join that races a disconnect either lands
/// before the cleanup (and is removed by it) or is refused.
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// room_name -> Set<connection_id>; a room without members has no entry
    room_index: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            room_index: DashMap::new(),
        }
    }

    /// Admit a new connection with an empty room set
    pub fn register(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::info!(connection_id = %handle.id, "Connection registered");

        handle
    }

    /// Add a connection to a room.
    ///
    /// Returns `Ok(true)` when the membership is new and `Ok(false)` when the
    /// connection was already a member. An unknown or already unregistered
    /// connection yields `UnknownConnection` and changes nothing.
    pub async fn join(&self, connection_id: Uuid, room: &str) -> Result<bool> {
        let handle = self
            .get_connection(connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;

        let mut membership = handle.membership.lock().await;
        if membership.closed {
            return Err(RelayError::UnknownConnection(connection_id));
        }

        let joined = membership.rooms.insert(room.to_string());
        self.room_index
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);

        if joined {
            tracing::debug!(connection_id = %connection_id, room = %room, "Joined room");
        }

        Ok(joined)
    }

    /// Current member ids of a room; empty when nobody is in it
    pub fn members_of(&self, room: &str) -> HashSet<Uuid> {
        self.room_index
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Handles of every current member of a room
    pub fn room_connections(&self, room: &str) -> Vec<Arc<ConnectionHandle>> {
        self.room_index
            .get(room)
            .map(|conn_ids| {
                conn_ids
                    .iter()
                    .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a connection from every room and discard it.
    ///
    /// Returns false when the id was not registered.
    pub async fn unregister(&self, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            return false;
        };

        let mut membership = handle.membership.lock().await;
        membership.closed = true;

        let room_count = membership.rooms.len();
        for room in membership.rooms.drain() {
            if let Some(mut members) = self.room_index.get_mut(&room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    drop(members);
                    // A concurrent join may have refilled the room in between
                    self.room_index.remove_if(&room, |_, members| members.is_empty());
                }
            }
        }

        tracing::info!(
            connection_id = %connection_id,
            rooms_left = room_count,
            "Connection unregistered"
        );

        true
    }

    /// Get connection by ID
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    /// Rooms a connection belongs to, sorted; empty for unknown ids
    pub async fn rooms_of(&self, connection_id: Uuid) -> Vec<String> {
        match self.get_connection(connection_id) {
            Some(handle) => handle.rooms().await,
            None => Vec::new(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.room_index.len()
    }

    /// All rooms with members, sorted by name
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .room_index
            .iter()
            .map(|entry| RoomInfo {
                name: entry.key().clone(),
                member_count: entry.value().len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Get statistics
    pub fn stats(&self) -> RegistryStats {
        let rooms: HashMap<String, usize> = self
            .room_index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();

        let oldest_connected_at = self
            .connections
            .iter()
            .map(|entry| entry.value().connected_at)
            .min();

        RegistryStats {
            total_connections: self.connections.len(),
            rooms,
            oldest_connected_at,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(registry: &ConnectionRegistry) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(tx), rx)
    }

    #[tokio::test]
    async fn test_register_starts_without_rooms() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = connect(&registry);

        assert_eq!(registry.connection_count(), 1);
        assert!(registry.rooms_of(handle.id).await.is_empty());
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = connect(&registry);

        assert_eq!(registry.join(handle.id, "lobby").await, Ok(true));
        let once = registry.members_of("lobby");
        assert_eq!(registry.join(handle.id, "lobby").await, Ok(false));
        let twice = registry.members_of("lobby");

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
        assert_eq!(registry.rooms_of(handle.id).await, vec!["lobby".to_string()]);
    }

    #[tokio::test]
    async fn test_join_unknown_connection_changes_nothing() {
        let registry = ConnectionRegistry::new();
        let ghost = Uuid::new_v4();

        assert_eq!(
            registry.join(ghost, "lobby").await,
            Err(RelayError::UnknownConnection(ghost))
        );
        assert!(registry.members_of("lobby").is_empty());
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn test_membership_is_many_to_many() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);

        registry.join(a.id, "x").await.unwrap();
        registry.join(a.id, "y").await.unwrap();
        registry.join(b.id, "y").await.unwrap();

        assert_eq!(registry.members_of("x"), HashSet::from([a.id]));
        assert_eq!(registry.members_of("y"), HashSet::from([a.id, b.id]));
        assert_eq!(registry.rooms_of(a.id).await, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(registry.room_connections("y").len(), 2);
    }

    #[tokio::test]
    async fn test_unregister_leaves_no_residue() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);

        registry.join(a.id, "x").await.unwrap();
        registry.join(a.id, "y").await.unwrap();
        registry.join(b.id, "y").await.unwrap();

        assert!(registry.unregister(a.id).await);

        assert!(registry.members_of("x").is_empty());
        assert_eq!(registry.members_of("y"), HashSet::from([b.id]));
        assert!(registry.get_connection(a.id).is_none());
        assert!(a.is_closed().await);

        // Empty rooms are dropped from the index
        let stats = registry.stats();
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.rooms.len(), 1);
        assert_eq!(stats.rooms.get("y"), Some(&1));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(&registry);

        assert!(registry.unregister(a.id).await);
        assert!(!registry.unregister(a.id).await);
        assert!(!registry.unregister(Uuid::new_v4()).await);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_join_after_unregister_is_refused() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(&registry);

        registry.unregister(a.id).await;
        assert!(registry.join(a.id, "lobby").await.is_err());
        assert!(registry.members_of("lobby").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_and_unregister_leave_no_ghosts() {
        let registry = Arc::new(ConnectionRegistry::new());

        for _ in 0..50 {
            let (tx, _rx) = mpsc::channel(1);
            let handle = registry.register(tx);
            let id = handle.id;

            let joiner = {
                let registry = registry.clone();
                tokio::spawn(async move {
                    for room in ["a", "b", "c"] {
                        let _ = registry.join(id, room).await;
                    }
                })
            };
            let leaver = {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.unregister(id).await;
                })
            };

            joiner.await.unwrap();
            leaver.await.unwrap();

            for room in ["a", "b", "c"] {
                assert!(!registry.members_of(room).contains(&id));
            }
        }

        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn test_stats_report_oldest_connection() {
        let registry = ConnectionRegistry::new();
        assert!(registry.stats().oldest_connected_at.is_none());

        let (first, _r1) = connect(&registry);
        let (_second, _r2) = connect(&registry);
        assert_eq!(registry.stats().oldest_connected_at, Some(first.connected_at));

        registry.unregister(first.id).await;
        let oldest = registry.stats().oldest_connected_at.unwrap();
        assert!(oldest >= first.connected_at);
    }

    #[tokio::test]
    async fn test_list_rooms_sorted() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(&registry);
        registry.join(a.id, "zeta").await.unwrap();
        registry.join(a.id, "alpha").await.unwrap();

        let names: Vec<String> = registry.list_rooms().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
