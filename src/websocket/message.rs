use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;
use crate::relay::{Envelope, RelayEvent};

/// Frames sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Join a room; data is the room name
    Enter(Value),
    /// Relay to a room; data is the envelope object
    Message(Value),
}

impl ClientFrame {
    /// Parse a text frame into a typed relay event
    pub fn parse(text: &str) -> Result<RelayEvent, RelayError> {
        let frame: ClientFrame = serde_json::from_str(text)
            .map_err(|e| RelayError::MalformedEvent(e.to_string()))?;
        frame.into_event()
    }

    pub fn into_event(self) -> Result<RelayEvent, RelayError> {
        match self {
            Self::Enter(Value::String(room)) => Ok(RelayEvent::Join { room }),
            Self::Enter(other) => Err(RelayError::MalformedEvent(format!(
                "enter expects a room name, got {}",
                json_type(&other)
            ))),
            Self::Message(data) => Envelope::from_value(data).map(RelayEvent::Message),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// A relayed envelope, forwarded unmodified
    Message(Value),
}

impl ServerMessage {
    pub fn relay(envelope: &Envelope) -> Self {
        Self::Message(envelope.payload().clone())
    }
}

/// What a connection's writer task receives
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Raw(ServerMessage),
    /// Serialized once and shared by every recipient of a fan-out
    Preserialized(Arc<str>),
}

impl OutboundMessage {
    pub fn preserialized(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(message)?;
        Ok(Self::Preserialized(Arc::from(json)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Raw(message) => serde_json::to_string(message),
            Self::Preserialized(json) => Ok(json.to_string()),
        }
    }
}
