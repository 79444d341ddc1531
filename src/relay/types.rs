//! Typed relay events and the message envelope

use serde_json::Value;

use crate::error::RelayError;

/// Inbound events of a single connection, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Join { room: String },
    Message(Envelope),
    Disconnect,
}

/// An opaque JSON object with a required `room` field.
///
/// The payload is forwarded to recipients exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    room: String,
    payload: Value,
}

impl Envelope {
    pub fn from_value(payload: Value) -> Result<Self, RelayError> {
        let room = match payload.get("room") {
            Some(Value::String(room)) => room.clone(),
            Some(_) => {
                return Err(RelayError::MalformedEvent(
                    "message room must be a string".to_string(),
                ))
            }
            None if payload.is_object() => {
                return Err(RelayError::MalformedEvent(
                    "message is missing a room".to_string(),
                ))
            }
            None => {
                return Err(RelayError::MalformedEvent(
                    "message must be an object".to_string(),
                ))
            }
        };

        Ok(Self { room, payload })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
