//! Socket configuration.
//!
//! Provides [`SocketOptions`] and the request option types passed to the
//! [`RealtimeSocket`](crate::RealtimeSocket) operations.
//!
//! # Defaults
//!
//! | Option | Default |
//! |--------|---------|
//! | `endpoint` | [`DEFAULT_ENDPOINT`] |
//! | `protocol_version` | `1.0.0` |
//! | `heartbeat_interval` | 30 s |
//! | `reply_timeout` | none (wait until reply or close) |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::identifiers::{ChannelId, JoinRef, Topic};
use crate::transport::ConnectionOptions;

// ============================================================================
// Constants
// ============================================================================

/// Hosted realtime websocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://wkuimailekpioxrlteqk.supabase.co/realtime/v1/websocket";

/// Protocol version sent as the `vsn` query parameter.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0.0";

/// Interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// SocketOptions
// ============================================================================

/// Validated socket configuration.
///
/// Built by [`SocketBuilder`](crate::SocketBuilder).
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Websocket endpoint, without query parameters.
    pub endpoint: Url,
    /// Project API key, sent as `apikey`.
    pub api_key: String,
    /// Protocol version, sent as `vsn`.
    pub protocol_version: String,
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Maximum wait for a reply. `None` waits until reply or close.
    pub reply_timeout: Option<Duration>,
}

impl SocketOptions {
    /// Returns the full URL to dial, with `apikey` and `vsn` appended.
    #[must_use]
    pub fn connect_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", &self.protocol_version);
        url
    }

    /// Returns the per-connection tuning derived from these options.
    #[inline]
    #[must_use]
    pub(crate) fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            heartbeat_interval: self.heartbeat_interval,
            reply_timeout: self.reply_timeout,
        }
    }
}

// ============================================================================
// JoinOptions
// ============================================================================

/// Parameters of [`RealtimeSocket::join_channel`](crate::RealtimeSocket::join_channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    /// Channel to join.
    pub channel_id: ChannelId,
    /// Whether the channel requires authorization.
    pub is_private: bool,
    /// Presence key to register under.
    pub presence_key: String,
}

impl JoinOptions {
    /// Creates options for a public channel with an empty presence key.
    #[must_use]
    pub fn new(channel_id: impl Into<ChannelId>) -> Self {
        Self {
            channel_id: channel_id.into(),
            is_private: false,
            presence_key: String::new(),
        }
    }

    /// Marks the channel as private.
    #[inline]
    #[must_use]
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Sets the presence key.
    #[inline]
    #[must_use]
    pub fn presence_key(mut self, key: impl Into<String>) -> Self {
        self.presence_key = key.into();
        self
    }
}

// ============================================================================
// OutboundMessage
// ============================================================================

/// Parameters of [`RealtimeSocket::send_message`](crate::RealtimeSocket::send_message).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Raw wire topic.
    pub topic: Topic,
    /// Event name.
    pub event: String,
    /// Payload; defaults to `{}`.
    pub payload: Value,
    /// Join reference to tag the frame with.
    pub join_ref: Option<JoinRef>,
}

impl OutboundMessage {
    /// Creates a message with an empty payload and no join reference.
    #[must_use]
    pub fn new(topic: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            topic: Topic::new(topic),
            event: event.into(),
            payload: Value::Object(Map::new()),
            join_ref: None,
        }
    }

    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Tags the message with a join reference.
    #[inline]
    #[must_use]
    pub fn join_ref(mut self, join_ref: JoinRef) -> Self {
        self.join_ref = Some(join_ref);
        self
    }
}

// ============================================================================
// CloseOptions
// ============================================================================

/// Parameters of [`RealtimeSocket::close`](crate::RealtimeSocket::close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOptions {
    /// Leave every joined channel before closing the transport.
    pub leave_channels: bool,
}

impl CloseOptions {
    /// Close without leaving channels.
    #[inline]
    #[must_use]
    pub const fn discard_channels() -> Self {
        Self {
            leave_channels: false,
        }
    }
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self {
            leave_channels: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn options() -> SocketOptions {
        SocketOptions {
            endpoint: Url::parse("wss://example.com/realtime/v1/websocket").expect("url"),
            api_key: "key with space".into(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reply_timeout: None,
        }
    }

    #[test]
    fn test_connect_url() {
        let url = options().connect_url();
        assert_eq!(
            url.as_str(),
            "wss://example.com/realtime/v1/websocket?apikey=key+with+space&vsn=1.0.0"
        );
    }

    #[test]
    fn test_join_options_defaults() {
        let join = JoinOptions::new("main");
        assert!(!join.is_private);
        assert_eq!(join.presence_key, "");

        let join = join.private(true).presence_key("k1");
        assert!(join.is_private);
        assert_eq!(join.presence_key, "k1");
    }

    #[test]
    fn test_outbound_message_builder() {
        let message = OutboundMessage::new("realtime:main", "custom")
            .payload(json!({ "a": 1 }))
            .join_ref(JoinRef::new(3));

        assert_eq!(message.topic.as_str(), "realtime:main");
        assert_eq!(message.payload, json!({ "a": 1 }));
        assert_eq!(message.join_ref, Some(JoinRef::new(3)));
        assert_eq!(OutboundMessage::new("t", "e").payload, json!({}));
    }

    #[test]
    fn test_close_options_default_leaves() {
        assert!(CloseOptions::default().leave_channels);
        assert!(!CloseOptions::discard_channels().leave_channels);
    }
}
