//! Connection event loop.
//!
//! One spawned task per connection owns the socket, the heartbeat timer,
//! the reference counter, the [`Correlator`] and the [`ChannelRegistry`].
//! Callers never touch that state directly; they send
//! [`ConnectionCommand`]s and await a `oneshot` reply.
//!
//! # Event Loop
//!
//! The task `select!`s over:
//!
//! - Incoming frames (replies, broadcasts, presence diffs), processed
//!   strictly in arrival order
//! - Commands from the public API
//! - The heartbeat tick
//!
//! When the loop ends for any reason, every pending request fails with
//! [`Error::ConnectionClosed`], the registry is cleared and a
//! [`LifecycleEvent::Close`] is emitted.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::{LifecycleEvent, Listeners, SocketError};
use crate::error::{Error, Result};
use crate::identifiers::{ChannelId, JoinRef, RefCounter, Topic};
use crate::protocol::{InboundFrame, OutboundFrame, ParsedEvent, PresenceTrack, Reply, events};

use super::connector::FrameStream;
use super::correlator::{Correlator, PendingKind, Responder};
use super::registry::{ChannelRegistry, Membership};

// ============================================================================
// Types
// ============================================================================

type WsSink = SplitSink<Box<dyn FrameStream>, Message>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Physical connection state.
///
/// ```text
/// Closed → Connecting → Open → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Closed,
    /// Transport being established.
    Connecting,
    /// Transport open; heartbeat running.
    Open,
}

// ============================================================================
// ConnectionSnapshot
// ============================================================================

/// Point-in-time view of the event loop's state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    /// Channel memberships, sorted by channel id.
    pub channels: Vec<(ChannelId, Membership)>,
    /// Number of outstanding pending requests.
    pub pending: usize,
    /// Reference the next outbound frame will carry.
    pub next_ref: u64,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send an arbitrary frame and wait for its reply.
    Send {
        topic: Topic,
        event: String,
        payload: Value,
        join_ref: Option<JoinRef>,
        response_tx: Responder,
    },
    /// Join a channel with the given join payload.
    Join {
        channel_id: ChannelId,
        payload: Value,
        response_tx: Responder,
    },
    /// Leave a joined channel.
    Leave {
        channel_id: ChannelId,
        response_tx: Responder,
    },
    /// Track presence on a joined channel.
    Track {
        channel_id: ChannelId,
        track: PresenceTrack,
        response_tx: Responder,
    },
    /// Drop pending entries whose caller gave up.
    PurgeAbandoned,
    /// Report current state.
    Snapshot {
        response_tx: oneshot::Sender<ConnectionSnapshot>,
    },
    /// First phase of a graceful close.
    BeginClose {
        leave_channels: bool,
        response_tx: oneshot::Sender<Vec<ChannelId>>,
    },
    /// Close the transport and end the loop.
    Shutdown { done_tx: oneshot::Sender<()> },
}

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Per-connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Maximum wait for a reply. `None` waits until the connection closes.
    pub reply_timeout: Option<Duration>,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running connection event loop.
///
/// Cheap to clone; all clones talk to the same task.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Reply wait bound.
    reply_timeout: Option<Duration>,
}

impl Connection {
    /// Starts the event loop on an already-open stream.
    ///
    /// Sets `state` to [`ConnectionState::Open`] and emits
    /// [`LifecycleEvent::Open`] before returning.
    pub fn spawn<S: FrameStream>(
        stream: S,
        options: ConnectionOptions,
        listeners: Arc<Listeners>,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        *state.write() = ConnectionState::Open;
        info!("Socket open");
        listeners.dispatch_lifecycle(&LifecycleEvent::Open);

        let event_loop = EventLoop {
            ref_counter: RefCounter::new(),
            correlator: Correlator::new(),
            registry: ChannelRegistry::new(),
            heartbeat_active: true,
            listeners,
            state,
        };

        let stream: Box<dyn FrameStream> = Box::new(stream);
        tokio::spawn(event_loop.run(stream, command_rx, options.heartbeat_interval));

        Self {
            command_tx,
            reply_timeout: options.reply_timeout,
        }
    }

    /// Returns `true` once the event loop has terminated.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Sends a frame and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the loop has terminated
    /// - [`Error::Connection`] if the frame could not be written
    /// - [`Error::ConnectionClosed`] if the connection closes first
    /// - [`Error::ReplyTimeout`] if a reply timeout is configured and elapses
    pub async fn send(
        &self,
        topic: Topic,
        event: String,
        payload: Value,
        join_ref: Option<JoinRef>,
    ) -> Result<Reply> {
        let label = (topic.to_string(), event.clone());
        self.request(label, |response_tx| ConnectionCommand::Send {
            topic,
            event,
            payload,
            join_ref,
            response_tx,
        })
        .await
    }

    /// Joins a channel.
    ///
    /// The join's own reference becomes the channel's join reference.
    /// A failed reply rolls the membership back.
    pub async fn join(&self, channel_id: ChannelId, payload: Value) -> Result<Reply> {
        let label = (channel_id.topic().to_string(), events::PHX_JOIN.to_string());
        self.request(label, |response_tx| ConnectionCommand::Join {
            channel_id,
            payload,
            response_tx,
        })
        .await
    }

    /// Leaves a channel.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelNotJoined`] without sending anything if the channel
    /// has no membership.
    pub async fn leave(&self, channel_id: ChannelId) -> Result<Reply> {
        let label = (channel_id.topic().to_string(), events::PHX_LEAVE.to_string());
        self.request(label, |response_tx| ConnectionCommand::Leave {
            channel_id,
            response_tx,
        })
        .await
    }

    /// Tracks presence on a joined channel.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelNotJoined`] if the channel has no membership.
    pub async fn track(&self, channel_id: ChannelId, track: PresenceTrack) -> Result<Reply> {
        let label = (channel_id.topic().to_string(), events::PRESENCE.to_string());
        self.request(label, |response_tx| ConnectionCommand::Track {
            channel_id,
            track,
            response_tx,
        })
        .await
    }

    /// Returns a snapshot of memberships and pending requests.
    pub async fn snapshot(&self) -> Result<ConnectionSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ConnectionCommand::Snapshot { response_tx })
            .map_err(|_| Error::NotConnected)?;
        response_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Stops the heartbeat and fails pending requests.
    ///
    /// With `leave_channels`, returns the channels still joined so the
    /// caller can leave them; otherwise discards them and returns nothing.
    pub async fn begin_close(&self, leave_channels: bool) -> Result<Vec<ChannelId>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ConnectionCommand::BeginClose {
                leave_channels,
                response_tx,
            })
            .map_err(|_| Error::NotConnected)?;
        response_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Closes the transport and waits for the event loop to finish.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .command_tx
            .send(ConnectionCommand::Shutdown { done_tx })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    /// Submits a reply-expecting command and awaits the result.
    async fn request<F>(&self, label: (String, String), build: F) -> Result<Reply>
    where
        F: FnOnce(Responder) -> ConnectionCommand,
    {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(build(response_tx))
            .map_err(|_| Error::NotConnected)?;

        let Some(reply_timeout) = self.reply_timeout else {
            return response_rx.await.map_err(|_| Error::ConnectionClosed)?;
        };

        match timeout(reply_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let (topic, event) = label;
                warn!(%topic, %event, "Reply timed out");

                // Receiver is dropped at this point; the loop sees the entry as abandoned.
                let _ = self.command_tx.send(ConnectionCommand::PurgeAbandoned);

                Err(Error::reply_timeout(
                    topic,
                    event,
                    saturating_millis(reply_timeout),
                ))
            }
        }
    }
}

/// Whole milliseconds in `duration`, capped at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// EventLoop
// ============================================================================

/// State owned exclusively by the connection task.
struct EventLoop {
    ref_counter: RefCounter,
    correlator: Correlator,
    registry: ChannelRegistry,
    heartbeat_active: bool,
    listeners: Arc<Listeners>,
    state: Arc<RwLock<ConnectionState>>,
}

impl EventLoop {
    async fn run(
        mut self,
        stream: Box<dyn FrameStream>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        heartbeat_interval: Duration,
    ) {
        let (mut ws_write, mut ws_read) = stream.split();

        let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown_ack: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_incoming_text(text.as_str());
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            let e = Error::from(e);
                            error!(error = %e, "WebSocket read failed");
                            self.listeners.dispatch_lifecycle(&LifecycleEvent::Error(SocketError {
                                message: e.to_string(),
                                raw: None,
                            }));
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the public API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Shutdown { done_tx }) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            shutdown_ack = Some(done_tx);
                            break;
                        }

                        Some(command) => self.handle_command(command, &mut ws_write).await,

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }

                _ = heartbeat.tick(), if self.heartbeat_active => {
                    self.listeners.dispatch_lifecycle(&LifecycleEvent::Heartbeat);
                    let message_ref = self.ref_counter.next_ref();
                    let frame = OutboundFrame::heartbeat(message_ref);
                    self.write_frame(frame, PendingKind::Heartbeat, None, &mut ws_write).await;
                }
            }
        }

        // Refuse further commands before failing waiters, so a caller woken
        // by the failure cannot register fresh state.
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            Self::reject(command);
        }

        self.teardown();

        if let Some(done_tx) = shutdown_ack {
            let _ = done_tx.send(());
        }

        debug!("Event loop terminated");
    }

    /// Answers a command that arrived after the loop stopped.
    fn reject(command: ConnectionCommand) {
        match command {
            ConnectionCommand::Send { response_tx, .. }
            | ConnectionCommand::Join { response_tx, .. }
            | ConnectionCommand::Leave { response_tx, .. }
            | ConnectionCommand::Track { response_tx, .. } => {
                let _ = response_tx.send(Err(Error::NotConnected));
            }
            ConnectionCommand::BeginClose { response_tx, .. } => {
                let _ = response_tx.send(Vec::new());
            }
            ConnectionCommand::Shutdown { done_tx } => {
                let _ = done_tx.send(());
            }
            ConnectionCommand::PurgeAbandoned | ConnectionCommand::Snapshot { .. } => {}
        }
    }

    /// Invalidates all connection-scoped state.
    fn teardown(&mut self) {
        *self.state.write() = ConnectionState::Closed;
        self.heartbeat_active = false;
        self.correlator.fail_all();
        self.registry.clear();

        info!("Socket closed");
        self.listeners.dispatch_lifecycle(&LifecycleEvent::Close);
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Parses, then routes one inbound text frame.
    fn handle_incoming_text(&mut self, text: &str) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, raw = %text, "Failed to parse incoming frame");
                self.listeners.dispatch_lifecycle(&LifecycleEvent::Error(SocketError {
                    message: Error::protocol(format!("failed to parse incoming frame: {e}"))
                        .to_string(),
                    raw: Some(text.to_string()),
                }));
                return;
            }
        };

        trace!(topic = %frame.topic, event = %frame.event, message_ref = ?frame.message_ref, "Frame received");
        self.listeners.dispatch_frame(&frame);

        match ParsedEvent::parse(frame) {
            ParsedEvent::Reply { message_ref, reply } => {
                let Some(request) = message_ref.and_then(|r| self.correlator.take(r)) else {
                    trace!(?message_ref, "Reply for unknown ref ignored");
                    return;
                };

                match &request.kind {
                    PendingKind::Join {
                        channel_id,
                        join_ref,
                    } => {
                        if reply.success {
                            self.registry.confirm_join(channel_id, *join_ref);
                        } else {
                            self.registry.rollback_join(channel_id, *join_ref);
                        }
                    }
                    PendingKind::Leave {
                        channel_id,
                        membership,
                    } => {
                        self.registry
                            .complete_leave(channel_id, *membership, reply.success);
                    }
                    PendingKind::Message | PendingKind::Heartbeat => {}
                }

                request.complete(Ok(reply));
            }

            ParsedEvent::Broadcast(event) => {
                self.listeners.dispatch_broadcast(&event);
            }

            ParsedEvent::PresenceDiff(diff) => {
                for change in &diff.joins {
                    self.listeners.dispatch_presence_joined(change);
                }
                for change in &diff.leaves {
                    self.listeners.dispatch_presence_left(change);
                }
            }

            ParsedEvent::Unknown { event } => {
                trace!(%event, "Unhandled event ignored");
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, command: ConnectionCommand, ws_write: &mut WsSink) {
        match command {
            ConnectionCommand::Send {
                topic,
                event,
                payload,
                join_ref,
                response_tx,
            } => {
                let message_ref = self.ref_counter.next_ref();
                let frame = OutboundFrame::new(topic, event, payload, message_ref, join_ref);
                self.write_frame(frame, PendingKind::Message, Some(response_tx), ws_write)
                    .await;
            }

            ConnectionCommand::Join {
                channel_id,
                payload,
                response_tx,
            } => {
                // The join consumes the ref it records as the join ref.
                let join_ref = JoinRef::from(self.ref_counter.peek());
                self.registry.begin_join(channel_id.clone(), join_ref);

                let message_ref = self.ref_counter.next_ref();
                let frame = OutboundFrame::new(
                    channel_id.topic(),
                    events::PHX_JOIN,
                    payload,
                    message_ref,
                    Some(join_ref),
                );
                let kind = PendingKind::Join {
                    channel_id,
                    join_ref,
                };
                self.write_frame(frame, kind, Some(response_tx), ws_write).await;
            }

            ConnectionCommand::Leave {
                channel_id,
                response_tx,
            } => {
                let Some(membership) = self.registry.begin_leave(&channel_id) else {
                    let _ = response_tx.send(Err(Error::channel_not_joined(channel_id)));
                    return;
                };

                let message_ref = self.ref_counter.next_ref();
                let frame = OutboundFrame::new(
                    channel_id.topic(),
                    events::PHX_LEAVE,
                    Value::Null,
                    message_ref,
                    Some(membership.join_ref),
                );
                let kind = PendingKind::Leave {
                    channel_id,
                    membership,
                };
                self.write_frame(frame, kind, Some(response_tx), ws_write).await;
            }

            ConnectionCommand::Track {
                channel_id,
                track,
                response_tx,
            } => {
                let Some(join_ref) = self.registry.join_ref(&channel_id) else {
                    let _ = response_tx.send(Err(Error::channel_not_joined(channel_id)));
                    return;
                };

                let payload = match serde_json::to_value(&track) {
                    Ok(payload) => payload,
                    Err(e) => {
                        let _ = response_tx.send(Err(Error::Json(e)));
                        return;
                    }
                };

                let message_ref = self.ref_counter.next_ref();
                let frame = OutboundFrame::new(
                    channel_id.topic(),
                    events::PRESENCE,
                    payload,
                    message_ref,
                    Some(join_ref),
                );
                self.write_frame(frame, PendingKind::Message, Some(response_tx), ws_write)
                    .await;
            }

            ConnectionCommand::PurgeAbandoned => {
                for kind in self.correlator.purge_abandoned() {
                    self.rollback(kind);
                }
            }

            ConnectionCommand::Snapshot { response_tx } => {
                let _ = response_tx.send(ConnectionSnapshot {
                    channels: self.registry.snapshot(),
                    pending: self.correlator.len(),
                    next_ref: self.ref_counter.peek().as_u64(),
                });
            }

            ConnectionCommand::BeginClose {
                leave_channels,
                response_tx,
            } => {
                self.heartbeat_active = false;
                self.correlator.fail_all();

                let channels = if leave_channels {
                    self.registry.channel_ids()
                } else {
                    self.registry.clear();
                    Vec::new()
                };

                debug!(leave_channels, count = channels.len(), "Close started");
                let _ = response_tx.send(channels);
            }

            // Handled by the select loop.
            ConnectionCommand::Shutdown { .. } => {}
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Registers the pending request, then writes the frame.
    ///
    /// A failed write completes the pending request immediately.
    async fn write_frame(
        &mut self,
        frame: OutboundFrame,
        kind: PendingKind,
        responder: Option<Responder>,
        ws_write: &mut WsSink,
    ) {
        let message_ref = frame.message_ref;

        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                if let Some(responder) = responder {
                    let _ = responder.send(Err(e));
                }
                self.rollback(kind);
                return;
            }
        };

        self.correlator.register(message_ref, kind, responder);

        trace!(topic = %frame.topic, event = %frame.event, %message_ref, "Frame sent");

        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
            warn!(error = %e, %message_ref, "Failed to write frame");
            if let Some(request) = self.correlator.take(message_ref) {
                let kind = request.complete(Err(Error::connection(e.to_string())));
                self.rollback(kind);
            }
        }
    }

    /// Undoes registry bookkeeping for a request that will never be answered.
    fn rollback(&mut self, kind: PendingKind) {
        match kind {
            PendingKind::Join {
                channel_id,
                join_ref,
            } => self.registry.rollback_join(&channel_id, join_ref),
            PendingKind::Leave {
                channel_id,
                membership,
            } => self.registry.complete_leave(&channel_id, membership, false),
            PendingKind::Message | PendingKind::Heartbeat => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
