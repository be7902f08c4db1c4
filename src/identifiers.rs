//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep message references, join references, channel ids
//! and topics from being mixed up at compile time.
//!
//! | Type | Wraps | Meaning |
//! |------|-------|---------|
//! | [`MessageRef`] | `u64` | Per-message correlation reference |
//! | [`JoinRef`] | `u64` | Reference of the join that opened a subscription |
//! | [`ChannelId`] | `String` | Application channel name (`room:<id>`, `main`) |
//! | [`Topic`] | `String` | Wire topic (`realtime:<channel id>`) |
//! | [`ListenerId`] | `u64` | Handle returned by listener registration |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Constants
// ============================================================================

/// Prefix the server expects on every channel topic.
pub const TOPIC_PREFIX: &str = "realtime:";

/// Global counter for listener ids.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// MessageRef
// ============================================================================

/// Reference number attached to every outbound frame.
///
/// Unique and strictly increasing for the lifetime of one connection.
/// Serialized on the wire as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageRef(u64);

impl MessageRef {
    /// Creates a reference from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageRef {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ============================================================================
// JoinRef
// ============================================================================

/// Reference of the `phx_join` message that established a subscription.
///
/// Tags later messages on the same topic so the server can tie them to
/// the right subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinRef(u64);

impl JoinRef {
    /// Creates a join reference from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<MessageRef> for JoinRef {
    #[inline]
    fn from(message_ref: MessageRef) -> Self {
        Self(message_ref.0)
    }
}

impl fmt::Display for JoinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RefCounter
// ============================================================================

/// Monotonic reference generator, starting at 1.
///
/// Owned by exactly one connection event loop.
#[derive(Debug)]
pub struct RefCounter {
    next: u64,
}

impl RefCounter {
    /// Creates a counter whose first reference is `1`.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the reference the next call to [`RefCounter::next_ref`] yields.
    #[inline]
    #[must_use]
    pub const fn peek(&self) -> MessageRef {
        MessageRef(self.next)
    }

    /// Allocates the next reference.
    #[inline]
    pub fn next_ref(&mut self) -> MessageRef {
        let current = self.next;
        self.next += 1;
        MessageRef(current)
    }
}

impl Default for RefCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ChannelId
// ============================================================================

/// Application-level channel name, without the topic prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    /// Creates a channel id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the wire topic for this channel.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Topic {
        Topic(format!("{TOPIC_PREFIX}{}", self.0))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Topic
// ============================================================================

/// Wire-level topic a frame is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Reserved control topic used for heartbeats.
    pub const PHOENIX: &'static str = "phoenix";

    /// Creates a topic from its raw wire form.
    #[inline]
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Returns the reserved control topic.
    #[inline]
    #[must_use]
    pub fn phoenix() -> Self {
        Self(Self::PHOENIX.to_string())
    }

    /// Returns the topic as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the channel id with the `realtime:` prefix stripped.
    ///
    /// Topics without the prefix are returned unchanged.
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.0.strip_prefix(TOPIC_PREFIX).unwrap_or(&self.0))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(topic: &str) -> Self {
        Self::new(topic)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generates a process-unique listener id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
