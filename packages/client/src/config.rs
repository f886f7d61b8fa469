//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::handshake::Action;

/// Host the forwarding unit listens on when nothing else is configured.
pub const DEFAULT_HOST: &str = "localhost:7777";

/// Connection settings for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// `host[:port]` of the forwarding unit
    #[serde(default = "default_host")]
    pub host: String,
    /// Connect with `wss://` instead of `ws://`
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub action: Action,
    /// How long to wait for the peer's close acknowledgement before the
    /// socket is dropped
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            secure: false,
            action: Action::default(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_close_timeout_ms() -> u64 {
    5000
}
