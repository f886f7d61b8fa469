//! Handshake descriptor and connection URI construction.
//!
//! The descriptor never travels as a frame. It is serialized to JSON,
//! base64-encoded (standard alphabet, padded) and embedded in the upgrade
//! request path:
//!
//! ```text
//! ws://<host>/<action>/<base64(json(descriptor))>/
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::HandshakeError;

/// Upgrade endpoints exposed by the forwarding unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Join a room's data channel
    #[default]
    Connect,
}

impl Action {
    pub fn path(self) -> &'static str {
        match self {
            Action::Connect => "ws/connect",
        }
    }
}

/// Request body the forwarding unit expects on `ws/connect`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JoinRequest {
    pub room_id: i32,
    pub user_id: i32,
    pub token: u32,
    pub stream: String,
    pub shared_key: String,
}

/// Key/value configuration that parameterizes the connection request.
///
/// Keys keep their insertion order when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeDescriptor {
    fields: Map<String, Value>,
}

impl HandshakeDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Build a descriptor from any value that serializes to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::NotAnObject`] if `value` serializes to
    /// anything but an object.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, HandshakeError> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(HandshakeError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn to_json(&self) -> Result<String, HandshakeError> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    /// JSON encoding of the descriptor in standard base64.
    pub fn to_base64(&self) -> Result<String, HandshakeError> {
        Ok(STANDARD.encode(self.to_json()?))
    }
}

impl From<Map<String, Value>> for HandshakeDescriptor {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Build the upgrade URI for `descriptor` against the configured host.
pub fn connect_uri(
    config: &ClientConfig,
    descriptor: &HandshakeDescriptor,
) -> Result<String, HandshakeError> {
    Ok(format!(
        "{}://{}/{}/{}/",
        config.scheme(),
        config.host,
        config.action.path(),
        descriptor.to_base64()?
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
