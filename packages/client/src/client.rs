//! Client facade: `join`, `send`, `close`.
//!
//! This is the whole surface the rest of an application relies on. The facade
//! owns the current [`Connection`] and the [`Dispatcher`] shared by every
//! connection it creates, so handlers survive a re-`join`.

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{Frame, FrameCodec, Payload, RecipientId};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};
use crate::dispatcher::{Dispatcher, HandlerId, LifecycleEvent};
use crate::error::{ClientError, TransportError};
use crate::handshake::{HandshakeDescriptor, connect_uri};
use crate::transport::{Connector, WebSocketConnector};

/// Transport client for one participant.
///
/// Instances are independent; construct one per participant and pass it
/// explicitly to whatever needs it.
pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    connection: Connection,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            dispatcher: Arc::new(Dispatcher::new()),
            connection: Connection::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn on_frame<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.dispatcher.on_frame(handler)
    }

    pub fn on_lifecycle<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on_lifecycle(handler)
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.dispatcher.remove(id)
    }

    /// Connect using `descriptor` as the handshake.
    ///
    /// Returns once the connection attempt has started; await
    /// [`wait_open`](Self::wait_open) or watch lifecycle events for the result.
    /// A previous connection that is still `Closing` finishes in the
    /// background and no longer reaches the registered handlers.
    ///
    /// # Errors
    ///
    /// * [`ClientError::InvalidState`] if a connection is already `Connecting` or `Open`
    /// * [`ClientError::Handshake`] if the descriptor cannot be serialized
    pub fn join(&mut self, descriptor: &HandshakeDescriptor) -> Result<(), ClientError> {
        let state = self.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Open) {
            return Err(ClientError::InvalidState {
                operation: "join",
                state,
            });
        }

        let uri = connect_uri(&self.config, descriptor)?;
        if state != ConnectionState::Idle {
            tracing::debug!("Replacing {} connection with a new one", state);
            self.connection.retire();
            self.connection = Connection::new();
        }
        self.connection.open(
            uri,
            self.connector.clone(),
            self.dispatcher.clone(),
            self.config.close_timeout(),
        )
    }

    /// Send `message` to `recipient_id`.
    ///
    /// Fire-and-forget: while the connection is not `Open` the message is
    /// dropped with a warning. Returns whether the message was queued.
    pub fn send(
        &self,
        message: impl Into<Payload>,
        recipient_id: impl Into<RecipientId>,
    ) -> bool {
        let payload = message.into();
        let recipient_id = recipient_id.into();
        let queued = self.connection.send(FrameCodec::encode(recipient_id, &payload));
        if queued {
            tracing::debug!(
                "Queued {} byte payload for {}",
                payload.len(),
                recipient_id
            );
        }
        queued
    }

    /// Send a dynamically typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] if `value` is neither a string nor a
    /// byte array. A dropped message is not an error, see [`send`](Self::send).
    pub fn send_value(
        &self,
        value: Value,
        recipient_id: impl Into<RecipientId>,
    ) -> Result<bool, ClientError> {
        let payload = Payload::try_from(value)?;
        Ok(self.send(payload, recipient_id))
    }

    /// Close the current connection. Idempotent; does not wait for closure.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Wait until the current connection attempt resolves.
    ///
    /// # Errors
    ///
    /// * [`ClientError::InvalidState`] if `join` has not been called
    /// * [`ClientError::Transport`] if the connection closed without opening
    pub async fn wait_open(&self) -> Result<(), ClientError> {
        let state = self.state();
        if state == ConnectionState::Idle {
            return Err(ClientError::InvalidState {
                operation: "wait for open",
                state,
            });
        }

        let mut rx = self.connection.subscribe();
        let reached = *rx
            .wait_for(|state| !matches!(state, ConnectionState::Idle | ConnectionState::Connecting))
            .await
            .map_err(|_| TransportError::ClosedBeforeOpen)?;

        match reached {
            ConnectionState::Open => Ok(()),
            _ => Err(TransportError::ClosedBeforeOpen.into()),
        }
    }

    /// Wait until the current connection is `Closed`. Returns immediately
    /// when nothing was ever joined.
    pub async fn closed(&self) {
        if self.state() == ConnectionState::Idle {
            return;
        }
        let mut rx = self.connection.subscribe();
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeConnector, channel_reader, permissive_writer};
    use crate::transport::{Inbound, MockFrameWriter};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn descriptor() -> HandshakeDescriptor {
        HandshakeDescriptor::new()
            .with("action", "connect")
            .with("room_id", 42)
    }

    async fn within<F: std::future::Future>(future: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(2), future)
            .await
            .expect("timed out")
    }

    #[tokio::test]
    async fn test_send_after_open_writes_header_and_payload() {
        // テスト項目: Open 後の send("hello", 7) は 9 バイトのフレームとして書き込まれる
        // given (前提条件):
        let mut writer = MockFrameWriter::new();
        writer
            .expect_send()
            .with(eq(vec![7, 0, 0, 0, b'h', b'e', b'l', b'l', b'o']))
            .times(1)
            .returning(|_| Ok(()));
        writer.expect_close().times(1).returning(|| Ok(()));
        let (inbound, reader) = channel_reader();
        let connector = Arc::new(FakeConnector::ready(Box::new(writer), reader));
        let mut client = Client::with_connector(ClientConfig::default(), connector);
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();

        // when (操作):
        client.send("hello", 7);
        client.close();
        inbound
            .send(Ok(Inbound::Closed {
                code: Some(1000),
                reason: String::new(),
            }))
            .unwrap();

        // then (期待する結果):
        within(client.closed()).await;
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_send_before_open_never_reaches_the_socket() {
        // テスト項目: Open 前の send はソケットに書き込まれず、エラーも返さない
        // given (前提条件):
        let mut writer = MockFrameWriter::new();
        writer.expect_send().times(0);
        writer.expect_close().times(1).returning(|| Ok(()));
        let (inbound, reader) = channel_reader();
        let (connector, release) = FakeConnector::gated(Box::new(writer), reader);
        let mut client = Client::with_connector(ClientConfig::default(), Arc::new(connector));

        // when (操作):
        assert!(!client.send("too early", 1));
        client.join(&descriptor()).unwrap();
        assert!(!client.send("still connecting", 1));
        release.send(()).unwrap();
        within(client.wait_open()).await.unwrap();
        client.close();
        assert!(!client.send("closing", 1));
        inbound
            .send(Ok(Inbound::Closed {
                code: Some(1000),
                reason: String::new(),
            }))
            .unwrap();

        // then (期待する結果):
        within(client.closed()).await;
    }

    #[tokio::test]
    async fn test_close_twice_requests_one_socket_close() {
        // テスト項目: close を 2 回呼んでもソケットの close 要求は 1 回だけ
        // given (前提条件):
        let mut writer = MockFrameWriter::new();
        writer.expect_close().times(1).returning(|| Ok(()));
        let (inbound, reader) = channel_reader();
        let connector = Arc::new(FakeConnector::ready(Box::new(writer), reader));
        let mut client = Client::with_connector(ClientConfig::default(), connector);
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();

        // when (操作):
        client.close();
        client.close();
        inbound
            .send(Ok(Inbound::Closed {
                code: Some(1000),
                reason: String::new(),
            }))
            .unwrap();

        // then (期待する結果):
        within(client.closed()).await;
        client.close();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_join_while_connecting_is_invalid() {
        // テスト項目: 接続中の再 join は InvalidState になる
        // given (前提条件):
        let mut client =
            Client::with_connector(ClientConfig::default(), Arc::new(FakeConnector::pending()));
        client.join(&descriptor()).unwrap();

        // when (操作):
        let result = client.join(&descriptor());

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::InvalidState {
                operation: "join",
                state: ConnectionState::Connecting
            })
        ));
    }

    #[tokio::test]
    async fn test_join_after_close_uses_a_fresh_connection() {
        // テスト項目: Closed の後に join すると新しい接続が開かれる
        // given (前提条件):
        let mut client =
            Client::with_connector(ClientConfig::default(), Arc::new(FakeConnector::pending()));
        client.close();
        assert_eq!(client.state(), ConnectionState::Closed);

        // when (操作):
        let result = client.join(&descriptor());

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_wait_open_reports_failed_handshake() {
        // テスト項目: ハンドシェイク失敗時 wait_open は Transport エラーを返す
        // given (前提条件):
        let connector = Arc::new(FakeConnector::failing(TransportError::Connect(
            "refused".to_string(),
        )));
        let mut client = Client::with_connector(ClientConfig::default(), connector);
        client.join(&descriptor()).unwrap();

        // when (操作):
        let result = within(client.wait_open()).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::ClosedBeforeOpen))
        ));
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_wait_open_without_join_is_invalid() {
        // テスト項目: join 前の wait_open は InvalidState になる
        // given (前提条件):
        let client = Client::new(ClientConfig::default());

        // when (操作):
        let result = client.wait_open().await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_send_value_rejects_unsupported_payload() {
        // テスト項目: サポート外の値の send_value は EncodeError を同期的に返す
        // given (前提条件):
        let client = Client::new(ClientConfig::default());

        // when (操作):
        let rejected = client.send_value(json!({"not": "a payload"}), 1);
        let accepted = client.send_value(json!("dropped while idle"), 1);

        // then (期待する結果):
        assert!(matches!(rejected, Err(ClientError::Encode(_))));
        assert_eq!(accepted.ok(), Some(false));
    }

    #[tokio::test]
    async fn test_handlers_survive_rejoin() {
        // テスト項目: 再 join 後も登録済みのハンドラにフレームが届く
        // given (前提条件):
        let (first_inbound, first_reader) = channel_reader();
        let connector = Arc::new(FakeConnector::ready(permissive_writer(), first_reader));
        let mut client = Client::with_connector(ClientConfig::default(), connector);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        client.on_frame(move |frame| seen_clone.lock().unwrap().push(frame.recipient_id().get()));
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();
        first_inbound.send(Ok(Inbound::Message(vec![1, 0, 0, 0]))).unwrap();
        drop(first_inbound);
        within(client.closed()).await;

        // when (操作):
        let (second_inbound, second_reader) = channel_reader();
        client.connector = Arc::new(FakeConnector::ready(permissive_writer(), second_reader));
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();
        second_inbound.send(Ok(Inbound::Message(vec![2, 0, 0, 0]))).unwrap();
        drop(second_inbound);
        within(client.closed()).await;

        // then (期待する結果):
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_join_while_open_is_invalid() {
        // テスト項目: Open 中の再 join は InvalidState になり、接続はそのまま維持される
        // given (前提条件):
        let (_inbound, reader) = channel_reader();
        let connector = Arc::new(FakeConnector::ready(permissive_writer(), reader));
        let mut client = Client::with_connector(ClientConfig::default(), connector);
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();

        // when (操作):
        let result = client.join(&descriptor());

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::InvalidState {
                operation: "join",
                state: ConnectionState::Open
            })
        ));
        assert_eq!(client.state(), ConnectionState::Open);
        assert!(client.send("still open", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_while_closing_hides_the_old_close() {
        // テスト項目: Closing 中に再 join しても、古い接続の close イベントは新しい接続の後に届かない
        // given (前提条件):
        let (_first_inbound, first_reader) = channel_reader();
        let connector = Arc::new(FakeConnector::ready(permissive_writer(), first_reader));
        let config = ClientConfig {
            close_timeout_ms: 1000,
            ..ClientConfig::default()
        };
        let mut client = Client::with_connector(config, connector);
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        client.on_lifecycle(move |event| events_clone.lock().unwrap().push(event.clone()));
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();
        client.close();
        assert_eq!(client.state(), ConnectionState::Closing);

        // when (操作):
        let (_second_inbound, second_reader) = channel_reader();
        client.connector = Arc::new(FakeConnector::ready(permissive_writer(), second_reader));
        client.join(&descriptor()).unwrap();
        within(client.wait_open()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // then (期待する結果):
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(
            *events.lock().unwrap(),
            vec![LifecycleEvent::Open, LifecycleEvent::Open]
        );
    }
}
