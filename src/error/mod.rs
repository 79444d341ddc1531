use thiserror::Error;
use uuid::Uuid;

/// Failures inside the relay core.
///
/// None of these are ever reported back to a client; callers log them and
/// keep serving every other connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Invalid room name: {0:?}")]
    InvalidRoom(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(Uuid),

    #[error("Send to connection {connection_id} failed: {reason}")]
    SendFailed {
        connection_id: Uuid,
        reason: SendFailure,
    },
}

/// Why a single recipient could not take a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The peer's outbound queue is full
    Backpressure,
    /// The peer's writer has gone away
    Closed,
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backpressure => write!(f, "outbound queue full"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

impl RelayError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEvent(_) => "malformed_event",
            Self::InvalidRoom(_) => "invalid_room",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::SendFailed { .. } => "send_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
