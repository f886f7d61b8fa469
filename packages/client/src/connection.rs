//! Lifecycle of one persistent socket.
//!
//! ```text
//! Idle ──open──▶ Connecting ──socket open──▶ Open
//!   │                 │                        │
//!   │               close                    close
//!   │                 ▼                        ▼
//!   └──close──▶ Closed ◀──socket close── Closing
//! ```
//!
//! A socket error or an unexpected close moves any state straight to `Closed`.
//! A `Connection` is never reopened; the facade creates a new one instead and
//! [retires](Connection::retire) the old one, which then finishes closing
//! without dispatching anything further.
//!
//! The socket halves live in a single task spawned by [`Connection::open`].
//! That task processes inbound messages and outbound commands one at a time,
//! so handlers of one connection never run concurrently and frames are
//! dispatched in arrival order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::codec::FrameCodec;
use crate::dispatcher::{Dispatcher, LifecycleEvent};
use crate::error::{ClientError, TransportError};
use crate::transport::{Connector, FrameReader, FrameWriter, Inbound, SocketHalves};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Command {
    Send(Vec<u8>),
    Close,
}

/// Handle to one socket and the task that owns it.
///
/// Dropping the handle closes the socket.
pub struct Connection {
    state: Arc<watch::Sender<ConnectionState>>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    retired: Arc<AtomicBool>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            state: Arc::new(state),
            commands: None,
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Start connecting to `uri`.
    ///
    /// Returns immediately with the connection in `Connecting`; the outcome
    /// is reported to `dispatcher` as lifecycle events.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] unless the connection is `Idle`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn open(
        &mut self,
        uri: String,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
        close_timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut current = ConnectionState::Idle;
        let started = self.state.send_if_modified(|state| {
            current = *state;
            if *state == ConnectionState::Idle {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ClientError::InvalidState {
                operation: "open",
                state: current,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.commands = Some(tx);

        tracing::info!("Connecting to {}", uri);
        let worker = Worker {
            uri,
            connector,
            dispatcher,
            state: self.state.clone(),
            retired: self.retired.clone(),
            commands: rx,
            close_timeout,
        };
        tokio::spawn(worker.run());
        Ok(())
    }

    /// Queue one encoded frame for transmission.
    ///
    /// Outside `Open` the frame is dropped and logged; nothing is buffered.
    /// Returns whether the frame was queued.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        let state = self.state();
        if state != ConnectionState::Open {
            tracing::warn!(
                "Dropping {} byte frame: connection is {}",
                bytes.len(),
                state
            );
            return false;
        }

        match &self.commands {
            Some(commands) if commands.send(Command::Send(bytes)).is_ok() => true,
            _ => {
                tracing::warn!("Dropping frame: connection task has stopped");
                false
            }
        }
    }

    /// Stop dispatching frames and lifecycle events from this connection.
    ///
    /// Used when a newer connection takes over the same [`Dispatcher`]. The
    /// socket itself keeps closing in the background.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Request the socket to close. Fire-and-forget and idempotent.
    pub fn close(&self) {
        let mut previous = ConnectionState::Idle;
        self.state.send_if_modified(|state| {
            previous = *state;
            match *state {
                ConnectionState::Idle => {
                    *state = ConnectionState::Closed;
                    true
                }
                ConnectionState::Connecting | ConnectionState::Open => {
                    *state = ConnectionState::Closing;
                    true
                }
                ConnectionState::Closing | ConnectionState::Closed => false,
            }
        });

        match previous {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::info!("Closing connection ({})", previous);
                if let Some(commands) = &self.commands {
                    let _ = commands.send(Command::Close);
                }
            }
            ConnectionState::Idle => tracing::debug!("Connection closed before it was opened"),
            ConnectionState::Closing | ConnectionState::Closed => {
                tracing::debug!("Ignoring close: connection is already {}", previous);
            }
        }
    }
}

enum Step {
    Inbound(Option<Result<Inbound, TransportError>>),
    Command(Option<Command>),
    CloseTimeout,
}

struct Worker {
    uri: String,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<watch::Sender<ConnectionState>>,
    retired: Arc<AtomicBool>,
    commands: mpsc::UnboundedReceiver<Command>,
    close_timeout: Duration,
}

impl Worker {
    async fn run(mut self) {
        let close = match self.establish().await {
            Ok((writer, reader)) => self.serve(writer, reader).await,
            Err(close) => close,
        };

        tracing::info!("Connection to {} closed", self.uri);
        // Watchers of Closed observe every event of this connection.
        self.emit(&close);
        self.state.send_replace(ConnectionState::Closed);
    }

    async fn establish(&mut self) -> Result<SocketHalves, LifecycleEvent> {
        let outcome = tokio::select! {
            result = self.connector.connect(&self.uri) => Some(result),
            () = wait_for_close(&mut self.commands) => None,
        };

        match outcome {
            Some(Ok(halves)) => {
                let opened = self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Open;
                        true
                    } else {
                        false
                    }
                });
                if opened {
                    tracing::info!("Connection to {} opened", self.uri);
                    self.emit(&LifecycleEvent::Open);
                }
                Ok(halves)
            }
            Some(Err(error)) => {
                self.report_error(error);
                Err(close_event(None, "connection failed"))
            }
            None => {
                tracing::info!("Connection attempt to {} aborted", self.uri);
                Err(close_event(None, "closed before open"))
            }
        }
    }

    async fn serve(
        &mut self,
        mut writer: Box<dyn FrameWriter>,
        mut reader: Box<dyn FrameReader>,
    ) -> LifecycleEvent {
        let mut close_deadline: Option<Instant> = None;
        let mut close = close_event(None, "");

        loop {
            let step = tokio::select! {
                // Queued commands go out before the next read.
                biased;
                command = self.commands.recv(), if close_deadline.is_none() => Step::Command(command),
                inbound = reader.recv() => Step::Inbound(inbound),
                () = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                    if close_deadline.is_some() => Step::CloseTimeout,
            };

            match step {
                Step::Inbound(Some(Ok(Inbound::Message(bytes)))) => self.deliver(&bytes),
                Step::Inbound(Some(Ok(Inbound::Closed { code, reason }))) => {
                    tracing::debug!("Peer closed the socket (code {:?})", code);
                    // Flush the close reply queued while reading the peer's close
                    if close_deadline.is_none()
                        && let Err(error) = writer.close().await
                    {
                        tracing::debug!("Close reply not delivered: {}", error);
                    }
                    close = LifecycleEvent::Close { code, reason };
                    break;
                }
                Step::Inbound(Some(Err(error))) => {
                    self.report_error(error);
                    break;
                }
                Step::Inbound(None) => {
                    tracing::debug!("Socket stream ended");
                    break;
                }
                Step::Command(Some(Command::Send(bytes))) => {
                    tracing::debug!("Writing {} byte frame", bytes.len());
                    if let Err(error) = writer.send(bytes).await {
                        self.report_error(error);
                        break;
                    }
                }
                // The handle was dropped, which also means close
                Step::Command(Some(Command::Close) | None) => {
                    self.state.send_replace(ConnectionState::Closing);
                    if let Err(error) = writer.close().await {
                        self.report_error(error);
                        break;
                    }
                    close_deadline = Some(Instant::now() + self.close_timeout);
                }
                Step::CloseTimeout => {
                    tracing::warn!(
                        "Peer did not acknowledge close within {:?}, dropping socket",
                        self.close_timeout
                    );
                    break;
                }
            }
        }

        // Release the socket before the state reads Closed.
        drop(writer);
        drop(reader);
        close
    }

    fn deliver(&self, bytes: &[u8]) {
        match FrameCodec::decode(bytes) {
            Ok(_) if self.is_retired() => {
                tracing::debug!("Discarding frame received by retired connection");
            }
            Ok(frame) => {
                tracing::debug!(
                    "Received frame for {} ({} byte payload)",
                    frame.recipient_id(),
                    frame.payload().len()
                );
                self.dispatcher.dispatch_frame(&frame);
            }
            Err(error) => tracing::warn!("Discarding malformed frame: {}", error),
        }
    }

    fn report_error(&self, error: TransportError) {
        tracing::warn!("Connection to {} failed: {}", self.uri, error);
        self.emit(&LifecycleEvent::Error(error));
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn emit(&self, event: &LifecycleEvent) {
        if self.is_retired() {
            tracing::debug!("Suppressing {:?} from retired connection", event);
            return;
        }
        self.dispatcher.dispatch_lifecycle(event);
    }
}

async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}

fn close_event(code: Option<u16>, reason: &str) -> LifecycleEvent {
    LifecycleEvent::Close {
        code,
        reason: reason.to_string(),
    }
}
