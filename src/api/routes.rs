use axum::{routing::get, Router};

use crate::server::AppState;

use super::handlers::{health, index, list_rooms, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/rooms", get(list_rooms))
        .route("/metrics", get(prometheus_metrics))
}
