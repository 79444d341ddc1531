//! Connection handle and related types

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RelayError, SendFailure};
use crate::websocket::OutboundMessage;

/// Rooms a connection has joined, guarded together with its liveness
#[derive(Debug, Default)]
pub(super) struct Membership {
    pub(super) rooms: HashSet<String>,
    /// Set once on unregister; a closed handle accepts no further joins
    pub(super) closed: bool,
}

/// Handle for a single relay connection
pub struct ConnectionHandle {
    pub id: Uuid,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    pub(super) membership: Mutex<Membership>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
            membership: Mutex::new(Membership::default()),
        }
    }

    /// Queue a message for this peer without waiting.
    ///
    /// A full queue or a finished writer fails immediately.
    pub fn try_send(&self, message: OutboundMessage) -> Result<(), RelayError> {
        self.sender.try_send(message).map_err(|e| RelayError::SendFailed {
            connection_id: self.id,
            reason: match e {
                TrySendError::Full(_) => SendFailure::Backpressure,
                TrySendError::Closed(_) => SendFailure::Closed,
            },
        })
    }

    /// Rooms this connection currently belongs to, sorted
    pub async fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.membership.lock().await.rooms.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    #[cfg(test)]
    pub(crate) async fn is_closed(&self) -> bool {
        self.membership.lock().await.closed
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}
