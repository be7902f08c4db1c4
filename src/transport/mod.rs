//! Connection transport layer.
//!
//! This module owns the single physical connection to the realtime server
//! and everything whose lifetime is bound to it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   commands (mpsc)   ┌────────────────────────┐
//! │  RealtimeSocket  │ ──────────────────► │  EventLoop task        │
//! │  (any task)      │ ◄────────────────── │  RefCounter            │
//! └──────────────────┘   results (oneshot) │  Correlator            │
//!                                          │  ChannelRegistry       │
//!                                          │  heartbeat interval    │
//!                                          └───────────┬────────────┘
//!                                                      │ WebSocket
//!                                                      ▼
//!                                              realtime server
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connector::connect` - Open the transport
//! 2. `Connection::spawn` - Start the event loop, begin heartbeats
//! 3. `Connection::join` / `send` / ... - Exchange frames
//! 4. `Connection::begin_close` + `shutdown` - Graceful close
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Event loop and its handle |
//! | `connector` | Transport seam and default websocket connector |
//! | `correlator` | Pending-request map |
//! | `registry` | Channel membership map |

// ============================================================================
// Submodules
// ============================================================================

/// Event loop and its handle.
pub mod connection;

/// Transport establishment.
pub mod connector;

/// Reply correlation.
pub(crate) mod correlator;

/// Channel memberships.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionOptions, ConnectionSnapshot, ConnectionState};
pub use connector::{BoxedFrameStream, Connector, FrameStream, WebSocketConnector};
pub use registry::{ChannelState, Membership};
