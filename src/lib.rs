// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Relay core
pub mod connection_manager;
pub mod relay;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
