//! Realtime socket client.
//!
//! This module provides the public entry point for talking to the
//! realtime server.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RealtimeSocket`] | Connection facade: join, leave, track, send, close |
//! | [`SocketBuilder`] | Fluent configuration builder |
//! | [`SocketOptions`] | Validated configuration |
//! | [`JoinOptions`] | Channel join parameters |
//! | [`OutboundMessage`] | Generic message parameters |
//! | [`CloseOptions`] | Close behavior |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for socket configuration.
pub mod builder;

/// Socket facade.
pub mod core;

/// Configuration and request options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SocketBuilder;
pub use core::RealtimeSocket;
pub use options::{
    CloseOptions, DEFAULT_ENDPOINT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PROTOCOL_VERSION,
    JoinOptions, OutboundMessage, SocketOptions,
};
