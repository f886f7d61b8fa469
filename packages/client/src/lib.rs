//! Client-side transport for an SFU (selective forwarding unit) data channel.
//!
//! One persistent WebSocket carries binary frames to and from many peers.
//! Each frame starts with a 4-byte little-endian route id followed by the
//! payload; see [`codec`] for the exact layout.
//!
//! ```no_run
//! use sfu_link_client::{Client, ClientConfig, HandshakeDescriptor};
//!
//! # async fn demo() -> Result<(), sfu_link_client::ClientError> {
//! let mut client = Client::new(ClientConfig::new("localhost:7777"));
//! client.on_frame(|frame| println!("{} bytes for {}", frame.payload().len(), frame.recipient_id()));
//!
//! client.join(&HandshakeDescriptor::new().with("room_id", 42).with("user_id", 7))?;
//! client.wait_open().await?;
//! client.send("hello", 7);
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handshake;
pub mod relay;
pub mod transport;

mod formatter;
mod input;
mod runner;
mod ui;

pub use client::Client;
pub use codec::{Frame, FrameCodec, Payload, RecipientId};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState};
pub use dispatcher::{Dispatcher, HandlerId, LifecycleEvent};
pub use error::{ClientError, DecodeError, EncodeError, HandshakeError, TransportError};
pub use handshake::{Action, HandshakeDescriptor, JoinRequest};
pub use relay::RelayEnvelope;
pub use runner::run_client;
