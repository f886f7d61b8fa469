//! Wire frame encoding and decoding.
//!
//! Every WebSocket message exchanged with the forwarding unit is one frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | route id (4 B) | payload (rest of message) |
//! +----------------+---------------------------+
//! ```
//!
//! The route id is a signed 32-bit integer in little-endian byte order, the
//! same order the forwarding unit uses when it reads the id back. The payload
//! is not length-prefixed; its length is the message length minus the header.

use std::fmt;
use std::str::Utf8Error;

use serde_json::Value;

use crate::error::{DecodeError, EncodeError};

/// Size of the routing header in bytes.
pub const HEADER_LEN: usize = 4;

/// Routing target of a frame: a peer, a broadcast sentinel, or a control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(i32);

impl RecipientId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// Route id that makes the forwarding unit broadcast a frame.
    ///
    /// A frame addressed to the sender's own user id is relayed to every other
    /// member of the sender's stream group.
    pub const fn broadcast_from(user_id: i32) -> Self {
        Self(user_id)
    }

    pub const fn to_wire(self) -> [u8; HEADER_LEN] {
        self.0.to_le_bytes()
    }

    pub const fn from_wire(bytes: [u8; HEADER_LEN]) -> Self {
        Self(i32::from_le_bytes(bytes))
    }
}

impl From<i32> for RecipientId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound payload: UTF-8 text or opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Wire bytes of the payload. Text is sent as its UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(bytes.to_vec())
    }
}

/// Dynamically typed payloads handed over by UI collaborators.
///
/// Strings become text, arrays of integers in `0..=255` become bytes.
/// Anything else is rejected.
impl TryFrom<Value> for Payload {
    type Error = EncodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Payload::Text(text)),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or(EncodeError::UnsupportedPayload("array with non-byte element"))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Payload::Binary),
            Value::Null => Err(EncodeError::UnsupportedPayload("null")),
            Value::Bool(_) => Err(EncodeError::UnsupportedPayload("boolean")),
            Value::Number(_) => Err(EncodeError::UnsupportedPayload("number")),
            Value::Object(_) => Err(EncodeError::UnsupportedPayload("object")),
        }
    }
}

/// One decoded transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    recipient_id: RecipientId,
    payload: Vec<u8>,
}

impl Frame {
    pub fn new(recipient_id: RecipientId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            recipient_id,
            payload: payload.into(),
        }
    }

    pub fn recipient_id(&self) -> RecipientId {
        self.recipient_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload interpreted as UTF-8 text.
    pub fn payload_text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Re-encode the frame into its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        FrameCodec::encode_bytes(self.recipient_id, &self.payload)
    }
}

/// Stateless encoder/decoder for the wire frame.
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a frame addressed to `recipient_id`.
    ///
    /// # Returns
    ///
    /// The 4-byte header immediately followed by the payload bytes
    pub fn encode(recipient_id: RecipientId, payload: &Payload) -> Vec<u8> {
        Self::encode_bytes(recipient_id, payload.as_bytes())
    }

    /// Encode a dynamically typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedPayload`] if `value` is neither a
    /// string nor a byte array.
    pub fn encode_value(recipient_id: RecipientId, value: Value) -> Result<Vec<u8>, EncodeError> {
        let payload = Payload::try_from(value)?;
        Ok(Self::encode(recipient_id, &payload))
    }

    /// Decode one transport message into a frame.
    ///
    /// A message consisting of the header alone is a valid frame with an
    /// empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if `bytes` is shorter than the header.
    pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
        let (header, payload) = split_header(bytes)?;
        Ok(Frame::new(RecipientId::from_wire(header), payload))
    }

    fn encode_bytes(recipient_id: RecipientId, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&recipient_id.to_wire());
        buf.extend_from_slice(payload);
        buf
    }
}

/// Split a 4-byte little-endian header off the front of `bytes`.
pub(crate) fn split_header(bytes: &[u8]) -> Result<([u8; HEADER_LEN], &[u8]), DecodeError> {
    match bytes.split_first_chunk::<HEADER_LEN>() {
        Some((header, rest)) => Ok((*header, rest)),
        None => Err(DecodeError::Truncated {
            len: bytes.len(),
            needed: HEADER_LEN,
        }),
    }
}
