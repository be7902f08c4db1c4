//! Realtime socket facade.
//!
//! [`RealtimeSocket`] composes the transport layer into the public
//! operations: connect, join, leave, track presence, send, close, plus
//! typed listener registration.
//!
//! # Example
//!
//! ```no_run
//! use realtime_socket::{CloseOptions, JoinOptions, RealtimeSocket};
//!
//! # async fn example() -> realtime_socket::Result<()> {
//! let socket = RealtimeSocket::builder().api_key("anon-key").build()?;
//!
//! socket.on_broadcast("message-create", |event| {
//!     println!("{}: {}", event.channel_id, event.payload);
//! });
//!
//! socket.connect("user-access-token").await?;
//! let reply = socket.join_channel(JoinOptions::new("room:42").private(true)).await?;
//! assert!(reply.success);
//!
//! socket.close(CloseOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::{LifecycleEvent, Listeners};
use crate::error::{Error, Result};
use crate::identifiers::{ChannelId, ListenerId};
use crate::protocol::{BroadcastEvent, InboundFrame, JoinPayload, PresenceChange, PresenceTrack, Reply};
use crate::transport::{Connection, ConnectionState, Connector, FrameStream, Membership};

use super::builder::SocketBuilder;
use super::options::{CloseOptions, JoinOptions, OutboundMessage, SocketOptions};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a socket.
struct SocketInner {
    /// Unique identifier for this socket instance.
    uuid: Uuid,
    /// Validated configuration.
    options: SocketOptions,
    /// Transport factory.
    connector: Arc<dyn Connector>,
    /// Credential retained from `connect`, re-sent in every join.
    access_token: RwLock<Option<String>>,
    /// Handle to the current connection's event loop.
    connection: Mutex<Option<Connection>>,
    /// Connection state, written by the event loop.
    state: Arc<RwLock<ConnectionState>>,
    /// Listener registries, read by the event loop.
    listeners: Arc<Listeners>,
}

// ============================================================================
// RealtimeSocket
// ============================================================================

/// Client for a channel-multiplexed realtime connection.
///
/// Cheap to clone; clones share one connection and one set of listeners.
/// Reconnecting is left to the caller: after a close, call
/// [`connect`](Self::connect) again and re-join channels.
#[derive(Clone)]
pub struct RealtimeSocket {
    /// Shared inner state.
    inner: Arc<SocketInner>,
}

// ============================================================================
// RealtimeSocket - Display
// ============================================================================

impl fmt::Debug for RealtimeSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSocket")
            .field("uuid", &self.inner.uuid)
            .field("endpoint", &self.inner.options.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeSocket - Constructor
// ============================================================================

impl RealtimeSocket {
    /// Creates a new socket builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SocketBuilder {
        SocketBuilder::new()
    }

    /// Creates a socket from validated options.
    pub(crate) fn new(options: SocketOptions, connector: Arc<dyn Connector>) -> Self {
        let uuid = Uuid::new_v4();
        debug!(%uuid, endpoint = %options.endpoint, "Socket created");

        Self {
            inner: Arc::new(SocketInner {
                uuid,
                options,
                connector,
                access_token: RwLock::new(None),
                connection: Mutex::new(None),
                state: Arc::new(RwLock::new(ConnectionState::Closed)),
                listeners: Arc::new(Listeners::new()),
            }),
        }
    }
}

// ============================================================================
// RealtimeSocket - Accessors
// ============================================================================

impl RealtimeSocket {
    /// Returns the socket's unique identifier.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &Uuid {
        &self.inner.uuid
    }

    /// Returns the socket configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SocketOptions {
        &self.inner.options
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Returns `true` while the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns `true` when there is no live transport.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Returns current channel memberships, sorted by channel id.
    ///
    /// Empty when not connected.
    pub async fn joined_channels(&self) -> Vec<(ChannelId, Membership)> {
        match self.open_connection() {
            Ok(connection) => connection
                .snapshot()
                .await
                .map(|snapshot| snapshot.channels)
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Returns the number of requests awaiting a reply.
    ///
    /// Zero when not connected.
    pub async fn pending_count(&self) -> usize {
        match self.open_connection() {
            Ok(connection) => connection
                .snapshot()
                .await
                .map(|snapshot| snapshot.pending)
                .unwrap_or_default(),
            Err(_) => 0,
        }
    }
}

// ============================================================================
// RealtimeSocket - Connection
// ============================================================================

impl RealtimeSocket {
    /// Opens the connection and starts heartbeats.
    ///
    /// `access_token` is retained and sent with every channel join.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if already open or connecting, or if the
    ///   transport fails to open
    pub async fn connect(&self, access_token: impl Into<String>) -> Result<()> {
        self.begin_connect()?;

        let url = self.inner.options.connect_url();
        match self.inner.connector.connect(&url).await {
            Ok(stream) => {
                self.attach(access_token.into(), stream);
                Ok(())
            }
            Err(e) => {
                warn!(uuid = %self.inner.uuid, error = %e, "Connect failed");
                *self.inner.state.write() = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// Opens the connection over an already-established stream.
    ///
    /// Bypasses the configured [`Connector`].
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] if already open or connecting.
    pub fn connect_stream<S: FrameStream>(&self, access_token: impl Into<String>, stream: S) -> Result<()> {
        self.begin_connect()?;
        self.attach(access_token.into(), stream);
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Stops the heartbeat and fails pending requests. With
    /// `leave_channels`, leaves every joined channel and waits for all
    /// leaves to settle before tearing down the transport.
    ///
    /// Closing an already-closed socket is a no-op.
    pub async fn close(&self, options: CloseOptions) -> Result<()> {
        let Some(connection) = self.inner.connection.lock().clone() else {
            debug!(uuid = %self.inner.uuid, "Close on idle socket");
            return Ok(());
        };

        let channels = connection
            .begin_close(options.leave_channels)
            .await
            .unwrap_or_default();

        if !channels.is_empty() {
            let leaves = channels
                .iter()
                .map(|channel_id| connection.leave(channel_id.clone()));
            let results = join_all(leaves).await;

            for (channel_id, result) in channels.iter().zip(results) {
                match result {
                    Ok(reply) if reply.success => debug!(%channel_id, "Left channel on close"),
                    Ok(reply) => debug!(%channel_id, status = ?reply.status(), "Leave rejected on close"),
                    Err(e) => debug!(%channel_id, error = %e, "Leave failed on close"),
                }
            }
        }

        connection.shutdown().await;
        self.inner.connection.lock().take();
        *self.inner.state.write() = ConnectionState::Closed;

        info!(uuid = %self.inner.uuid, "Socket closed by caller");
        Ok(())
    }

    /// Moves `Closed` to `Connecting`, rejecting concurrent connects.
    fn begin_connect(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        let current = *state;
        if current != ConnectionState::Closed {
            return Err(Error::connection(format!("socket is already {current:?}")));
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    /// Starts the event loop on an open stream.
    fn attach<S: FrameStream>(&self, access_token: String, stream: S) {
        *self.inner.access_token.write() = Some(access_token);

        let connection = Connection::spawn(
            stream,
            self.inner.options.connection_options(),
            Arc::clone(&self.inner.listeners),
            Arc::clone(&self.inner.state),
        );

        *self.inner.connection.lock() = Some(connection);
        debug!(uuid = %self.inner.uuid, "Connection attached");
    }

    /// Returns the live connection, or [`Error::NotConnected`].
    fn open_connection(&self) -> Result<Connection> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        match self.inner.connection.lock().as_ref() {
            Some(connection) if !connection.is_closed() => Ok(connection.clone()),
            _ => Err(Error::NotConnected),
        }
    }
}

// ============================================================================
// RealtimeSocket - Operations
// ============================================================================

impl RealtimeSocket {
    /// Sends a frame and waits for the correlated reply.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the socket is not open (nothing is sent)
    /// - [`Error::Connection`] if the frame could not be written
    /// - [`Error::ConnectionClosed`] if the connection closes before a reply
    /// - [`Error::ReplyTimeout`] if a reply timeout is configured and elapses
    pub async fn send_message(&self, message: OutboundMessage) -> Result<Reply> {
        let connection = self.open_connection()?;
        connection
            .send(message.topic, message.event, message.payload, message.join_ref)
            .await
    }

    /// Joins `realtime:<channel id>`.
    ///
    /// The membership is recorded before the join is sent and rolled back
    /// if the reply is not `ok`.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub async fn join_channel(&self, options: JoinOptions) -> Result<Reply> {
        let connection = self.open_connection()?;

        let access_token = self.inner.access_token.read().clone().unwrap_or_default();
        let payload = JoinPayload::new(access_token, options.presence_key, options.is_private);
        let payload = serde_json::to_value(&payload)?;

        debug!(channel_id = %options.channel_id, private = options.is_private, "Joining channel");
        connection.join(options.channel_id, payload).await
    }

    /// Leaves a joined channel.
    ///
    /// The membership is removed only on an `ok` reply.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotJoined`] if the channel has no membership
    /// - otherwise same as [`send_message`](Self::send_message)
    pub async fn leave_channel(&self, channel_id: impl Into<ChannelId>) -> Result<Reply> {
        let connection = self.open_connection()?;
        connection.leave(channel_id.into()).await
    }

    /// Tracks `presence_id` on a joined channel.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotJoined`] if the channel has no membership
    /// - otherwise same as [`send_message`](Self::send_message)
    pub async fn track_presence(
        &self,
        channel_id: impl Into<ChannelId>,
        presence_id: impl Into<String>,
    ) -> Result<Reply> {
        let connection = self.open_connection()?;
        connection
            .track(channel_id.into(), PresenceTrack::new(presence_id))
            .await
    }
}

// ============================================================================
// RealtimeSocket - Listeners
// ============================================================================

impl RealtimeSocket {
    /// Subscribes to broadcasts with the given application event name.
    pub fn on_broadcast<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&BroadcastEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.on_broadcast(event, handler)
    }

    /// Subscribes to presence joins.
    pub fn on_presence_joined<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&PresenceChange) + Send + Sync + 'static,
    {
        self.inner.listeners.on_presence_joined(handler)
    }

    /// Subscribes to presence leaves.
    pub fn on_presence_left<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&PresenceChange) + Send + Sync + 'static,
    {
        self.inner.listeners.on_presence_left(handler)
    }

    /// Subscribes to lifecycle events (open, close, heartbeat, error).
    pub fn on_lifecycle<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.on_lifecycle(handler)
    }

    /// Subscribes to every parsed inbound frame.
    pub fn on_frame<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        self.inner.listeners.on_frame(handler)
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use url::Url;

    use crate::transport::BoxedFrameStream;

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self, url: &Url) -> Result<BoxedFrameStream> {
            Err(Error::connection(format!("refused: {}", url.host_str().unwrap_or_default())))
        }
    }

    fn socket() -> RealtimeSocket {
        RealtimeSocket::builder()
            .api_key("anon")
            .endpoint("ws://localhost/socket")
            .connector(RefusingConnector)
            .build()
            .expect("build")
    }

    #[tokio::test]
    async fn test_operations_fail_when_not_connected() {
        let socket = socket();

        assert!(socket.is_destroyed());
        assert!(matches!(
            socket.send_message(OutboundMessage::new("realtime:main", "x")).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            socket.join_channel(JoinOptions::new("main")).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(socket.leave_channel("main").await, Err(Error::NotConnected)));
        assert!(matches!(
            socket.track_presence("main", "u1").await,
            Err(Error::NotConnected)
        ));
        assert_eq!(socket.pending_count().await, 0);
        assert!(socket.joined_channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_closed() {
        let socket = socket();

        let result = socket.connect("token").await;
        assert!(matches!(result, Err(Error::Connection { .. })));
        assert_eq!(socket.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_idle_socket_is_noop() {
        let socket = socket();
        assert!(socket.close(CloseOptions::default()).await.is_ok());
    }

    #[test]
    fn test_unsubscribe() {
        let socket = socket();
        let id = socket.on_presence_joined(|_| {});
        assert!(socket.unsubscribe(id));
        assert!(!socket.unsubscribe(id));
    }

    #[test]
    fn test_debug_contains_uuid() {
        let socket = socket();
        let debug = format!("{socket:?}");
        assert!(debug.contains(&socket.uuid().to_string()));
    }
}
