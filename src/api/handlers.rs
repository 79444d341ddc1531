use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::{RegistryStats, RoomInfo};
use crate::relay::RelayStatsSnapshot;
use crate::server::AppState;

/// Banner returned for plain HTTP requests
pub const BANNER: &str = "SYNC SERVER";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: RegistryStats,
    pub relay: RelayStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomInfo>,
    pub total: usize,
}

pub async fn index() -> &'static str {
    BANNER
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.stats(),
        relay: state.dispatcher.stats(),
    })
}

/// GET /rooms - rooms that currently have members
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    let rooms = state.registry.list_rooms();
    let total = rooms.len();
    Json(RoomsResponse { rooms, total })
}
