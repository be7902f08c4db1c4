//! Error types for the realtime socket client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use realtime_socket::{Error, Result};
//!
//! async fn example(socket: &RealtimeSocket) -> Result<()> {
//!     let reply = socket.join_channel(JoinOptions::new("room:42")).await?;
//!     assert!(reply.success);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Url`] |
//! | Connection | [`Error::Connection`], [`Error::NotConnected`], [`Error::ConnectionClosed`] |
//! | Channel | [`Error::ChannelNotJoined`] |
//! | Protocol | [`Error::Protocol`] |
//! | Timeout | [`Error::ReplyTimeout`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ChannelId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`SocketBuilder::build`](crate::SocketBuilder::build)
    /// when options are missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL could not be parsed.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport failed to connect or to write a frame.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the transport failure.
        message: String,
    },

    /// Operation attempted while the socket is not open.
    #[error("Failed to send message: socket not open")]
    NotConnected,

    /// Connection closed while a reply was still outstanding.
    #[error("Socket closed before any reply received")]
    ConnectionClosed,

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Operation requires a channel membership that does not exist.
    #[error("Channel not joined: {channel_id}")]
    ChannelNotJoined {
        /// The channel that was expected to be joined.
        channel_id: ChannelId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// No reply arrived within the configured reply timeout.
    #[error("Reply to {event} on {topic} timed out after {timeout_ms}ms")]
    ReplyTimeout {
        /// Topic of the unanswered message.
        topic: String,
        /// Event of the unanswered message.
        event: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a channel-not-joined error.
    #[inline]
    pub fn channel_not_joined(channel_id: ChannelId) -> Self {
        Self::ChannelNotJoined { channel_id }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a reply timeout error.
    #[inline]
    pub fn reply_timeout(topic: impl Into<String>, event: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ReplyTimeout {
            topic: topic.into(),
            event: event.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReplyTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed after a reconnect or retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionClosed | Self::ReplyTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
