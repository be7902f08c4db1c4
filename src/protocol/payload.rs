//! Payload shapes for outbound requests.
//!
//! | Type | Sent with | Shape |
//! |------|-----------|-------|
//! | [`JoinPayload`] | `phx_join` | `{config: {...}, access_token}` |
//! | [`PresenceTrack`] | `presence` | `{type: "presence", event: "track", payload: {id}}` |
//! | [`BroadcastBatch`] | HTTP broadcast endpoint | `{messages: [{topic, event, payload}]}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// JoinPayload
// ============================================================================

/// Payload of a `phx_join` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPayload {
    /// Subscription configuration.
    pub config: JoinConfig,
    /// Bearer credential retained from `connect`.
    pub access_token: String,
}

impl JoinPayload {
    /// Creates a join payload with broadcast acks and self-echo disabled.
    #[must_use]
    pub fn new(access_token: impl Into<String>, presence_key: impl Into<String>, private: bool) -> Self {
        Self {
            config: JoinConfig {
                broadcast: BroadcastConfig::default(),
                presence: PresenceConfig {
                    key: presence_key.into(),
                },
                postgres_changes: Vec::new(),
                private,
            },
            access_token: access_token.into(),
        }
    }
}

/// The `config` object of a join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinConfig {
    /// Broadcast delivery options.
    pub broadcast: BroadcastConfig,
    /// Presence options.
    pub presence: PresenceConfig,
    /// Database change subscriptions. Always empty for this client.
    pub postgres_changes: Vec<Value>,
    /// Whether the channel requires authorization.
    pub private: bool,
}

/// Broadcast delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BroadcastConfig {
    /// Ask the server to acknowledge broadcasts.
    pub ack: bool,
    /// Echo our own broadcasts back to us.
    #[serde(rename = "self")]
    pub self_echo: bool,
}

/// Presence options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PresenceConfig {
    /// Application-defined presence key.
    pub key: String,
}

// ============================================================================
// PresenceTrack
// ============================================================================

/// Payload of a presence `track` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceTrack {
    #[serde(rename = "type")]
    kind: &'static str,
    event: &'static str,
    payload: PresenceMeta,
}

impl PresenceTrack {
    /// Creates a track request for the given presence id.
    #[must_use]
    pub fn new(presence_id: impl Into<String>) -> Self {
        Self {
            kind: "presence",
            event: "track",
            payload: PresenceMeta {
                id: presence_id.into(),
            },
        }
    }

    /// Returns the tracked presence id.
    #[inline]
    #[must_use]
    pub fn presence_id(&self) -> &str {
        &self.payload.id
    }
}

/// Identity carried in a presence meta entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    /// Identity id.
    pub id: String,
}

// ============================================================================
// BroadcastBatch
// ============================================================================

/// Body posted to the HTTP broadcast endpoint.
///
/// Shares the event/payload vocabulary of socket broadcasts; the HTTP
/// client that posts it lives outside this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BroadcastBatch {
    /// Messages to publish.
    pub messages: Vec<BroadcastMessage>,
}

impl BroadcastBatch {
    /// Creates an empty batch.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the batch.
    #[must_use]
    pub fn message(mut self, topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        self.messages.push(BroadcastMessage {
            topic: topic.into(),
            event: event.into(),
            payload,
        });
        self
    }
}

/// One message of a [`BroadcastBatch`].
///
/// `topic` is the channel id without the `realtime:` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Channel id.
    pub topic: String,
    /// Application event name.
    pub event: String,
    /// Application payload.
    pub payload: Value,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_join_payload_shape() {
        let payload = JoinPayload::new("token-abc", "key-1", true);
        let value = serde_json::to_value(&payload).expect("serialize");

        assert_eq!(
            value,
            json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "key-1" },
                    "postgres_changes": [],
                    "private": true
                },
                "access_token": "token-abc"
            })
        );
    }

    #[test]
    fn test_presence_track_shape() {
        let track = PresenceTrack::new("u1");
        let value = serde_json::to_value(&track).expect("serialize");

        assert_eq!(track.presence_id(), "u1");
        assert_eq!(
            value,
            json!({ "type": "presence", "event": "track", "payload": { "id": "u1" } })
        );
    }

    #[test]
    fn test_broadcast_batch_shape() {
        let batch = BroadcastBatch::new().message(
            "room:1",
            "screenshot-response",
            json!({ "url": "https://example.com/a.png" }),
        );
        let value = serde_json::to_value(&batch).expect("serialize");

        assert_eq!(value["messages"][0]["topic"], json!("room:1"));
        assert_eq!(value["messages"][0]["event"], json!("screenshot-response"));
    }
}
