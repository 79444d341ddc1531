//! Connection registry for relay connections
//!
//! This module provides:
//! - Connection handle management
//! - Room membership indexing
//! - Registry statistics

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::{RegistryStats, RoomInfo};
pub use types::ConnectionHandle;
