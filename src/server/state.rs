use std::sync::Arc;

use crate::config::Settings;
use crate::connection_manager::ConnectionRegistry;
use crate::relay::RelayDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<RelayDispatcher>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(RelayDispatcher::new(registry.clone()));

        Self {
            settings: Arc::new(settings),
            registry,
            dispatcher,
        }
    }
}
