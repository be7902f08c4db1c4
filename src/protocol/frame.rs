//! Outbound and inbound frame types.
//!
//! Every message on the socket is a JSON object with a topic, an event
//! name, a payload and a reference.
//!
//! # Format
//!
//! Outbound:
//! ```json
//! { "topic": "realtime:main", "event": "phx_join", "payload": {}, "ref": "3", "join_ref": "3" }
//! ```
//!
//! Inbound:
//! ```json
//! { "topic": "realtime:main", "event": "phx_reply", "payload": { "status": "ok" }, "ref": "3" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::{JoinRef, MessageRef, Topic};

// ============================================================================
// Event Names
// ============================================================================

/// Protocol-level event names.
pub mod events {
    /// Subscribe to a topic.
    pub const PHX_JOIN: &str = "phx_join";
    /// Unsubscribe from a topic.
    pub const PHX_LEAVE: &str = "phx_leave";
    /// Direct reply to a referenced message.
    pub const PHX_REPLY: &str = "phx_reply";
    /// Keep-alive on the control topic.
    pub const HEARTBEAT: &str = "heartbeat";
    /// Application broadcast push.
    pub const BROADCAST: &str = "broadcast";
    /// Presence delta push.
    pub const PRESENCE_DIFF: &str = "presence_diff";
    /// Presence track / untrack request.
    pub const PRESENCE: &str = "presence";
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// A frame sent from the client to the server.
///
/// `ref` is always present; `join_ref` only for messages tied to a
/// subscription (join, leave and per-channel messages).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Destination topic.
    #[serde(serialize_with = "serialize_topic")]
    pub topic: Topic,

    /// Event name.
    pub event: String,

    /// Event payload (always an object on the wire).
    pub payload: Value,

    /// Unique message reference.
    #[serde(rename = "ref", serialize_with = "serialize_message_ref")]
    pub message_ref: MessageRef,

    /// Reference of the owning subscription.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_join_ref"
    )]
    pub join_ref: Option<JoinRef>,
}

impl OutboundFrame {
    /// Creates a frame. A `null` payload is replaced with `{}`.
    #[must_use]
    pub fn new(
        topic: Topic,
        event: impl Into<String>,
        payload: Value,
        message_ref: MessageRef,
        join_ref: Option<JoinRef>,
    ) -> Self {
        let payload = match payload {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        Self {
            topic,
            event: event.into(),
            payload,
            message_ref,
            join_ref,
        }
    }

    /// Creates a heartbeat frame on the control topic.
    #[inline]
    #[must_use]
    pub fn heartbeat(message_ref: MessageRef) -> Self {
        Self::new(
            Topic::phoenix(),
            events::HEARTBEAT,
            Value::Null,
            message_ref,
            None,
        )
    }

    /// Serializes the frame to its wire text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// InboundFrame
// ============================================================================

/// A frame received from the server.
///
/// `ref` is absent for server pushes and equals the triggering request's
/// reference for `phx_reply`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    /// Source topic.
    #[serde(deserialize_with = "deserialize_topic")]
    pub topic: Topic,

    /// Event name.
    pub event: String,

    /// Event payload.
    #[serde(default)]
    pub payload: Value,

    /// Reference of the message being replied to.
    #[serde(rename = "ref", default, deserialize_with = "deserialize_message_ref")]
    pub message_ref: Option<MessageRef>,
}

impl InboundFrame {
    /// Parses a frame from wire text.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` if this frame is a direct reply.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.event == events::PHX_REPLY
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

fn serialize_topic<S: Serializer>(topic: &Topic, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(topic.as_str())
}

fn deserialize_topic<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Topic, D::Error> {
    String::deserialize(deserializer).map(Topic::new)
}

fn serialize_message_ref<S: Serializer>(
    message_ref: &MessageRef,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(message_ref)
}

fn serialize_join_ref<S: Serializer>(
    join_ref: &Option<JoinRef>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match join_ref {
        Some(join_ref) => serializer.collect_str(join_ref),
        None => serializer.serialize_none(),
    }
}

/// Accepts `"12"`, `12` or `null`.
fn deserialize_message_ref<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<MessageRef>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => s.parse().map(Some).map_err(de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(|n| Some(MessageRef::new(n)))
            .ok_or_else(|| de::Error::custom("ref must be a non-negative integer")),
        other => Err(de::Error::custom(format!("unexpected ref value: {other}"))),
    }
}

// ============================================================================
// Tests
// ============================================================================
