//! Registry statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Point-in-time view of the registry
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    /// room name -> member count; only rooms with members appear
    pub rooms: HashMap<String, usize>,
    /// Accept time of the longest-lived connection
    pub oldest_connected_at: Option<DateTime<Utc>>,
}

/// Room information
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub name: String,
    pub member_count: usize,
}
