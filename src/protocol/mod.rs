//! Realtime protocol message types.
//!
//! This module defines the frame format exchanged with the realtime
//! server and the classification of inbound frames.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `phx_join` | Client → Server | Subscribe to a topic |
//! | `phx_leave` | Client → Server | Unsubscribe from a topic |
//! | `presence` | Client → Server | Track presence on a topic |
//! | `heartbeat` | Client → Server | Keep-alive on the `phoenix` topic |
//! | `phx_reply` | Server → Client | Reply correlated by `ref` |
//! | `broadcast` | Server → Client | Application event push |
//! | `presence_diff` | Server → Client | Presence join/leave delta |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Outbound and inbound frames |
//! | `event` | Inbound classification and reply mapping |
//! | `payload` | Request payload shapes |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound event classification.
pub mod event;

/// Wire frames.
pub mod frame;

/// Outbound payload shapes.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{BroadcastEvent, ParsedEvent, PresenceChange, PresenceDiff, Reply};
pub use frame::{InboundFrame, OutboundFrame, events};
pub use payload::{
    BroadcastBatch, BroadcastConfig, BroadcastMessage, JoinConfig, JoinPayload, PresenceConfig,
    PresenceMeta, PresenceTrack,
};
