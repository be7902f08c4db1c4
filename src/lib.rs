//! Realtime Socket - Channel-multiplexed realtime client.
//!
//! This library implements the client side of a Phoenix-channel style
//! realtime protocol: many logical topics share one persistent websocket,
//! requests are correlated with replies by reference number, and the
//! server pushes broadcasts and presence deltas to subscribers.
//!
//! # Architecture
//!
//! The client is layered:
//!
//! - **Connection manager**: one event-loop task owns the socket, the
//!   heartbeat timer and the reference counter
//! - **Reply correlator**: reference → waiting caller, completed exactly once
//! - **Channel registry**: channel → join reference, rolled back on failure
//! - **Event dispatcher**: typed listener registries fed in arrival order
//! - **Facade**: [`RealtimeSocket`]
//!
//! Reconnection is the caller's decision: the client only reports
//! [`LifecycleEvent::Close`] and fails what was outstanding.
//!
//! # Quick Start
//!
//! ```no_run
//! use realtime_socket::{CloseOptions, JoinOptions, RealtimeSocket, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let socket = RealtimeSocket::builder()
//!         .api_key("anon-key")
//!         .build()?;
//!
//!     socket.on_presence_joined(|change| {
//!         println!("{} joined {}", change.presence_key, change.channel_id);
//!     });
//!
//!     socket.connect("access-token").await?;
//!     socket.join_channel(JoinOptions::new("main").presence_key("me")).await?;
//!     socket.track_presence("main", "user-1").await?;
//!
//!     socket.close(CloseOptions::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`RealtimeSocket`], builder and options |
//! | [`dispatch`] | Listener registries and lifecycle events |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame and payload types |
//! | [`transport`] | Connection event loop (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Socket facade, builder and options.
///
/// Use [`RealtimeSocket::builder()`] to create a configured socket.
pub mod client;

/// Typed listener registries.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
pub mod identifiers;

/// Realtime protocol frame types.
pub mod protocol;

/// Connection transport layer.
///
/// Internal module owning the socket and its event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    CloseOptions, JoinOptions, OutboundMessage, RealtimeSocket, SocketBuilder, SocketOptions,
};

// Dispatch types
pub use dispatch::{LifecycleEvent, SocketError};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelId, JoinRef, ListenerId, MessageRef, Topic};

// Protocol types
pub use protocol::{BroadcastBatch, BroadcastEvent, InboundFrame, PresenceChange, Reply};

// Transport types
pub use transport::{ChannelState, ConnectionState, Connector, Membership, WebSocketConnector};
