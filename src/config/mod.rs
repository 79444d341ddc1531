mod settings;

pub use settings::{LoggingConfig, ServerConfig, Settings, WebSocketConfig};
