//! Error types for the SFU transport client.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Payload could not be turned into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The value is neither text nor a byte sequence
    #[error("unsupported payload type: {0}")]
    UnsupportedPayload(&'static str),
}

/// Inbound message could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Message is shorter than the fixed-width header it must carry
    #[error("message truncated: got {len} bytes, need at least {needed}")]
    Truncated { len: usize, needed: usize },

    /// Relay prefix carries a kind byte the client does not know
    #[error("unknown relay kind: {0}")]
    UnknownRelayKind(u8),
}

/// Handshake descriptor could not be serialized into the connection URI.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to serialize handshake descriptor: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Descriptor must be a JSON object
    #[error("handshake descriptor must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Socket-level failure. Reported through lifecycle events, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection or upgrade handshake failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// Read or write on an established socket failed
    #[error("socket error: {0}")]
    Socket(String),

    /// Socket closed before it ever reached the open state
    #[error("connection closed before it was opened")]
    ClosedBeforeOpen,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Socket(err.to_string())
    }
}

/// Errors surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Operation is not allowed in the current connection state
    #[error("cannot {operation} while connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
