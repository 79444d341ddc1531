//! API layer - HTTP endpoint handlers.

mod handlers;
mod metrics;
mod routes;

pub use handlers::{health, index, list_rooms, stats, BANNER};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
