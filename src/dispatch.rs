//! Typed listener registries.
//!
//! Each event category has its own registry so protocol-level events
//! (lifecycle, raw frames) never share a namespace with application
//! broadcast names.
//!
//! | Category | Registration | Payload |
//! |----------|--------------|---------|
//! | Broadcast | [`Listeners::on_broadcast`] | [`BroadcastEvent`] |
//! | Presence joined | [`Listeners::on_presence_joined`] | [`PresenceChange`] |
//! | Presence left | [`Listeners::on_presence_left`] | [`PresenceChange`] |
//! | Lifecycle | [`Listeners::on_lifecycle`] | [`LifecycleEvent`] |
//! | Raw frame | [`Listeners::on_frame`] | [`InboundFrame`] |
//!
//! Handlers run on the connection's event loop, in frame arrival order.
//! They must not block.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::ListenerId;
use crate::protocol::{BroadcastEvent, InboundFrame, PresenceChange};

// ============================================================================
// Types
// ============================================================================

/// Handler for application broadcasts.
pub type BroadcastHandler = Arc<dyn Fn(&BroadcastEvent) + Send + Sync>;

/// Handler for presence joins or leaves.
pub type PresenceHandler = Arc<dyn Fn(&PresenceChange) + Send + Sync>;

/// Handler for connection lifecycle events.
pub type LifecycleHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Handler for every parsed inbound frame.
pub type FrameHandler = Arc<dyn Fn(&InboundFrame) + Send + Sync>;

type Registry<H> = RwLock<Vec<(ListenerId, H)>>;

// ============================================================================
// LifecycleEvent
// ============================================================================

/// Connection lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Transport opened.
    Open,
    /// Transport closed; channel and pending state was discarded.
    Close,
    /// A heartbeat was sent.
    Heartbeat,
    /// Malformed inbound frame or transport read failure.
    Error(SocketError),
}

/// Detail of a [`LifecycleEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    /// What went wrong.
    pub message: String,
    /// Raw frame text, when the error came from parsing.
    pub raw: Option<String>,
}

// ============================================================================
// Listeners
// ============================================================================

/// Listener registries shared by a socket and its event loop.
#[derive(Default)]
pub struct Listeners {
    broadcast: RwLock<FxHashMap<String, Vec<(ListenerId, BroadcastHandler)>>>,
    presence_joined: Registry<PresenceHandler>,
    presence_left: Registry<PresenceHandler>,
    lifecycle: Registry<LifecycleHandler>,
    frames: Registry<FrameHandler>,
}

impl Listeners {
    /// Creates empty registries.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for broadcasts named `event`.
    pub fn on_broadcast<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&BroadcastEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::generate();
        self.broadcast
            .write()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Registers a presence-joined handler.
    pub fn on_presence_joined<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&PresenceChange) + Send + Sync + 'static,
    {
        push(&self.presence_joined, Arc::new(handler))
    }

    /// Registers a presence-left handler.
    pub fn on_presence_left<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&PresenceChange) + Send + Sync + 'static,
    {
        push(&self.presence_left, Arc::new(handler))
    }

    /// Registers a lifecycle handler.
    pub fn on_lifecycle<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        push(&self.lifecycle, Arc::new(handler))
    }

    /// Registers a raw frame handler.
    pub fn on_frame<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        push(&self.frames, Arc::new(handler))
    }

    /// Removes a listener from whichever registry holds it.
    ///
    /// Returns `true` if a listener was removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;

        {
            let mut broadcast = self.broadcast.write();
            for handlers in broadcast.values_mut() {
                removed |= retain_except(handlers, id);
            }
            broadcast.retain(|_, handlers| !handlers.is_empty());
        }

        removed |= retain_except(&mut self.presence_joined.write(), id);
        removed |= retain_except(&mut self.presence_left.write(), id);
        removed |= retain_except(&mut self.lifecycle.write(), id);
        removed |= retain_except(&mut self.frames.write(), id);
        removed
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Delivers a broadcast to listeners of its event name.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch_broadcast(&self, event: &BroadcastEvent) -> usize {
        let handlers: Vec<BroadcastHandler> = self
            .broadcast
            .read()
            .get(&event.event)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(event = %event.event, channel = %event.channel_id, count = handlers.len(), "Dispatching broadcast");

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Delivers a presence join.
    pub fn dispatch_presence_joined(&self, change: &PresenceChange) -> usize {
        invoke(&self.presence_joined, change)
    }

    /// Delivers a presence leave.
    pub fn dispatch_presence_left(&self, change: &PresenceChange) -> usize {
        invoke(&self.presence_left, change)
    }

    /// Delivers a lifecycle event.
    pub fn dispatch_lifecycle(&self, event: &LifecycleEvent) -> usize {
        invoke(&self.lifecycle, event)
    }

    /// Delivers a raw frame.
    pub fn dispatch_frame(&self, frame: &InboundFrame) -> usize {
        invoke(&self.frames, frame)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn push<H>(registry: &Registry<H>, handler: H) -> ListenerId {
    let id = ListenerId::generate();
    registry.write().push((id, handler));
    id
}

fn retain_except<H>(handlers: &mut Vec<(ListenerId, H)>, id: ListenerId) -> bool {
    let before = handlers.len();
    handlers.retain(|(existing, _)| *existing != id);
    handlers.len() != before
}

/// Snapshots handlers before calling them so a handler may register or
/// remove listeners without deadlocking.
fn invoke<T: ?Sized>(registry: &Registry<Arc<dyn Fn(&T) + Send + Sync>>, value: &T) -> usize {
    let handlers: Vec<_> = registry.read().iter().map(|(_, h)| Arc::clone(h)).collect();
    for handler in &handlers {
        handler(value);
    }
    handlers.len()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::identifiers::ChannelId;

    fn broadcast(event: &str) -> BroadcastEvent {
        BroadcastEvent {
            channel_id: ChannelId::new("main"),
            event: event.into(),
            payload: json!({}),
        }
    }

    #[test]
    fn test_broadcast_routed_by_name() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        listeners.on_broadcast("message-create", move |event| {
            assert_eq!(event.channel_id.as_str(), "main");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(listeners.dispatch_broadcast(&broadcast("message-create")), 1);
        assert_eq!(listeners.dispatch_broadcast(&broadcast("message-delete")), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = Listeners::new();
        let id = listeners.on_broadcast("typing", |_| {});
        let other = listeners.on_lifecycle(|_| {});

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert_eq!(listeners.dispatch_broadcast(&broadcast("typing")), 0);
        assert_eq!(listeners.dispatch_lifecycle(&LifecycleEvent::Open), 1);

        assert!(listeners.remove(other));
        assert_eq!(listeners.dispatch_lifecycle(&LifecycleEvent::Open), 0);
    }

    #[test]
    fn test_presence_registries_are_separate() {
        let listeners = Listeners::new();
        listeners.on_presence_joined(|_| {});

        let change = PresenceChange {
            channel_id: ChannelId::new("main"),
            presence_key: "k1".into(),
            presence_ids: vec!["u1".into()],
        };

        assert_eq!(listeners.dispatch_presence_joined(&change), 1);
        assert_eq!(listeners.dispatch_presence_left(&change), 0);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let listeners = Arc::new(Listeners::new());

        let inner = Arc::clone(&listeners);
        listeners.on_lifecycle(move |_| {
            inner.on_lifecycle(|_| {});
        });

        assert_eq!(listeners.dispatch_lifecycle(&LifecycleEvent::Heartbeat), 1);
        assert_eq!(listeners.dispatch_lifecycle(&LifecycleEvent::Heartbeat), 2);
    }
}
