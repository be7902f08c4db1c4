//! Inbound frame classification.
//!
//! Frames are classified by their `event` field:
//!
//! | Event | Parsed as | Routed to |
//! |-------|-----------|-----------|
//! | `phx_reply` | [`ParsedEvent::Reply`] | Pending request with the same ref |
//! | `broadcast` | [`ParsedEvent::Broadcast`] | Listeners of `payload.event` |
//! | `presence_diff` | [`ParsedEvent::PresenceDiff`] | Presence joined / left listeners |
//! | anything else | [`ParsedEvent::Unknown`] | Dropped |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::identifiers::{ChannelId, MessageRef};

use super::frame::{InboundFrame, events};

// ============================================================================
// Reply
// ============================================================================

/// Caller-facing result of a reply-expecting operation.
///
/// `success` is `true` when the server answered with `status: "ok"`;
/// `data` is the full reply payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Whether the server accepted the request.
    pub success: bool,
    /// Full reply payload, including `status`.
    pub data: Value,
}

impl Reply {
    /// Builds a reply from a `phx_reply` payload.
    #[must_use]
    pub fn from_payload(payload: Value) -> Self {
        let success = payload.get("status").and_then(Value::as_str) == Some("ok");
        Self {
            success,
            data: payload,
        }
    }

    /// Returns the reply status string, if any.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.data.get("status").and_then(Value::as_str)
    }

    /// Returns the `response` object of the reply.
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        self.data.get("response")
    }
}

// ============================================================================
// Push Events
// ============================================================================

/// An application broadcast delivered on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    /// Channel the broadcast arrived on.
    pub channel_id: ChannelId,
    /// Application-level event name.
    pub event: String,
    /// Application payload.
    pub payload: Value,
}

/// Identities that joined or left under one presence key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    /// Channel the diff arrived on.
    pub channel_id: ChannelId,
    /// Presence key the metas are grouped under.
    pub presence_key: String,
    /// Identity ids extracted from the meta entries.
    pub presence_ids: Vec<String>,
}

/// A presence delta, split into joins and leaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceDiff {
    /// One entry per joined presence key.
    pub joins: Vec<PresenceChange>,
    /// One entry per departed presence key.
    pub leaves: Vec<PresenceChange>,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Direct reply to a request.
    Reply {
        /// Reference of the request being answered.
        message_ref: Option<MessageRef>,
        /// Mapped reply.
        reply: Reply,
    },

    /// Application broadcast.
    Broadcast(BroadcastEvent),

    /// Presence delta.
    PresenceDiff(PresenceDiff),

    /// Unrecognized or incomplete event.
    Unknown {
        /// Raw event name.
        event: String,
    },
}

impl ParsedEvent {
    /// Classifies an inbound frame.
    #[must_use]
    pub fn parse(frame: InboundFrame) -> Self {
        match frame.event.as_str() {
            events::PHX_REPLY => Self::Reply {
                message_ref: frame.message_ref,
                reply: Reply::from_payload(frame.payload),
            },

            events::BROADCAST => {
                let channel_id = frame.topic.channel_id();
                let mut payload = frame.payload;
                let event = payload
                    .get("event")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match event {
                    Some(event) => Self::Broadcast(BroadcastEvent {
                        channel_id,
                        event,
                        payload: payload
                            .get_mut("payload")
                            .map(Value::take)
                            .unwrap_or(Value::Null),
                    }),
                    None => Self::Unknown { event: frame.event },
                }
            }

            events::PRESENCE_DIFF => {
                let channel_id = frame.topic.channel_id();
                Self::PresenceDiff(PresenceDiff {
                    joins: presence_changes(&channel_id, frame.payload.get("joins")),
                    leaves: presence_changes(&channel_id, frame.payload.get("leaves")),
                })
            }

            _ => Self::Unknown { event: frame.event },
        }
    }
}

/// Unpacks `{ key: { metas: [{ id }] } }` into one change per key.
fn presence_changes(channel_id: &ChannelId, section: Option<&Value>) -> Vec<PresenceChange> {
    let Some(entries) = section.and_then(Value::as_object) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|(presence_key, entry)| PresenceChange {
            channel_id: channel_id.clone(),
            presence_key: presence_key.clone(),
            presence_ids: entry
                .get("metas")
                .and_then(Value::as_array)
                .map(|metas| {
                    metas
                        .iter()
                        .filter_map(|meta| meta.get("id").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn parse(text: &str) -> ParsedEvent {
        ParsedEvent::parse(InboundFrame::decode(text).expect("decode"))
    }

    #[test]
    fn test_reply_ok() {
        let parsed = parse(
            r#"{"topic":"realtime:main","event":"phx_reply","ref":"3",
                "payload":{"status":"ok","response":{"postgres_changes":[]}}}"#,
        );

        match parsed {
            ParsedEvent::Reply { message_ref, reply } => {
                assert_eq!(message_ref, Some(MessageRef::new(3)));
                assert!(reply.success);
                assert_eq!(reply.status(), Some("ok"));
                assert_eq!(reply.response(), Some(&json!({ "postgres_changes": [] })));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_reply_error() {
        let parsed = parse(
            r#"{"topic":"realtime:main","event":"phx_reply","ref":"4",
                "payload":{"status":"error","response":{"reason":"unauthorized"}}}"#,
        );

        match parsed {
            ParsedEvent::Reply { reply, .. } => {
                assert!(!reply.success);
                assert_eq!(reply.data["response"]["reason"], json!("unauthorized"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_broadcast() {
        let parsed = parse(
            r#"{"ref":null,"event":"broadcast","topic":"realtime:room:080f",
                "payload":{"event":"message-create","type":"broadcast","payload":{"id":"170f"}}}"#,
        );

        assert_eq!(
            parsed,
            ParsedEvent::Broadcast(BroadcastEvent {
                channel_id: ChannelId::new("room:080f"),
                event: "message-create".into(),
                payload: json!({ "id": "170f" }),
            })
        );
    }

    #[test]
    fn test_broadcast_without_event_name() {
        let parsed = parse(r#"{"ref":null,"event":"broadcast","topic":"realtime:main","payload":{}}"#);
        assert!(matches!(parsed, ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_presence_diff_joins_only() {
        let parsed = parse(
            r#"{"event":"presence_diff","topic":"realtime:main",
                "payload":{"joins":{"k1":{"metas":[{"id":"u1"}]}},"leaves":{}}}"#,
        );

        let ParsedEvent::PresenceDiff(diff) = parsed else {
            panic!("expected presence diff");
        };
        assert_eq!(
            diff.joins,
            vec![PresenceChange {
                channel_id: ChannelId::new("main"),
                presence_key: "k1".into(),
                presence_ids: vec!["u1".into()],
            }]
        );
        assert!(diff.leaves.is_empty());
    }

    #[test]
    fn test_presence_diff_joins_and_leaves() {
        let parsed = parse(
            r#"{"event":"presence_diff","topic":"realtime:call:0","ref":null,
                "payload":{
                    "joins":{"k1":{"metas":[{"phx_ref":"GD","id":"u1"},{"id":"u2"}]}},
                    "leaves":{"k2":{"metas":[{"id":"u3"}]}}
                }}"#,
        );

        let ParsedEvent::PresenceDiff(diff) = parsed else {
            panic!("expected presence diff");
        };
        assert_eq!(diff.joins.len(), 1);
        assert_eq!(diff.joins[0].presence_ids, vec!["u1", "u2"]);
        assert_eq!(diff.leaves.len(), 1);
        assert_eq!(diff.leaves[0].presence_key, "k2");
        assert_eq!(diff.leaves[0].channel_id.as_str(), "call:0");
    }

    #[test]
    fn test_presence_diff_empty() {
        let parsed = parse(r#"{"event":"presence_diff","topic":"realtime:main","payload":{}}"#);
        assert_eq!(parsed, ParsedEvent::PresenceDiff(PresenceDiff::default()));
    }

    #[test]
    fn test_unknown_event() {
        let parsed = parse(r#"{"event":"system","topic":"realtime:main","payload":{"x":1}}"#);
        assert_eq!(
            parsed,
            ParsedEvent::Unknown {
                event: "system".into()
            }
        );
    }
}
