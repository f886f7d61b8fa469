//! Socket seam between [`Connection`](crate::Connection) and the network.
//!
//! A [`Connector`] performs the upgrade handshake and hands back independent
//! writer/reader halves. [`WebSocketConnector`] is the production
//! implementation over `tokio-tungstenite`; tests substitute their own.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One complete transport message
    Message(Vec<u8>),
    /// Peer sent a close frame
    Closed { code: Option<u16>, reason: String },
}

/// Write half of an established socket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameWriter: Send {
    /// Transmit one binary message.
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Request a close handshake.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an established socket.
#[async_trait]
pub trait FrameReader: Send {
    /// Next inbound item, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;
}

pub type SocketHalves = (Box<dyn FrameWriter>, Box<dyn FrameReader>);

/// Establishes sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<SocketHalves, TransportError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, uri: &str) -> Result<SocketHalves, TransportError> {
        let (ws_stream, response) = connect_async(uri)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("Upgrade accepted with status {}", response.status());

        let (sink, stream) = ws_stream.split();
        Ok((Box::new(WsWriter { sink }), Box::new(WsReader { stream })))
    }
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.sink.send(Message::Binary(bytes.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.send(Message::Close(None)).await?;
        Ok(())
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let inbound = match self.stream.next().await? {
                Ok(Message::Binary(data)) => Inbound::Message(data.to_vec()),
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received text message, decoding its UTF-8 bytes as a frame");
                    Inbound::Message(text.as_str().as_bytes().to_vec())
                }
                Ok(Message::Close(close_frame)) => {
                    let (code, reason) = close_frame
                        .map(|cf| (Some(u16::from(cf.code)), cf.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    Inbound::Closed { code, reason }
                }
                // Ping replies are queued by tungstenite itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(inbound));
        }
    }
}
