//! Reply correlation.
//!
//! Maps the reference of every reply-expecting frame to the caller waiting
//! on it. Each entry is completed exactly once: by a matching `phx_reply`,
//! by a write failure, or by connection close.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ChannelId, JoinRef, MessageRef};
use crate::protocol::Reply;

use super::registry::Membership;

// ============================================================================
// Types
// ============================================================================

/// Channel on which a waiting caller receives its result.
pub(crate) type Responder = oneshot::Sender<Result<Reply>>;

/// What a pending request was sent for.
///
/// Determines the registry bookkeeping applied when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingKind {
    /// Plain message.
    Message,
    /// Keep-alive; nobody waits on it.
    Heartbeat,
    /// Channel join carrying the provisional join reference.
    Join {
        channel_id: ChannelId,
        join_ref: JoinRef,
    },
    /// Channel leave, with the membership as it was before the leave.
    Leave {
        channel_id: ChannelId,
        membership: Membership,
    },
}

/// One outstanding request.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub kind: PendingKind,
    responder: Option<Responder>,
}

impl PendingRequest {
    /// Consumes the entry and delivers `result` to the caller, if any.
    pub fn complete(self, result: Result<Reply>) -> PendingKind {
        if let Some(responder) = self.responder {
            // Receiver gone means the caller stopped waiting.
            let _ = responder.send(result);
        }
        self.kind
    }

    /// Returns `true` if a caller registered but has stopped waiting.
    fn is_abandoned(&self) -> bool {
        self.responder
            .as_ref()
            .is_some_and(oneshot::Sender::is_closed)
    }
}

// ============================================================================
// Correlator
// ============================================================================

/// Pending-request map keyed by [`MessageRef`].
#[derive(Debug, Default)]
pub(crate) struct Correlator {
    pending: FxHashMap<MessageRef, PendingRequest>,
}

impl Correlator {
    /// Creates an empty correlator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending request.
    pub fn register(&mut self, message_ref: MessageRef, kind: PendingKind, responder: Option<Responder>) {
        trace!(%message_ref, ?kind, "Pending request registered");
        self.pending
            .insert(message_ref, PendingRequest { kind, responder });
    }

    /// Removes and returns the entry for `message_ref`.
    ///
    /// Unknown or already-completed references yield `None`.
    #[inline]
    pub fn take(&mut self, message_ref: MessageRef) -> Option<PendingRequest> {
        self.pending.remove(&message_ref)
    }

    /// Fails every outstanding request with [`Error::ConnectionClosed`].
    ///
    /// Returns the kinds of the drained entries.
    pub fn fail_all(&mut self) -> Vec<PendingKind> {
        let drained: Vec<_> = self.pending.drain().collect();
        let count = drained.len();

        let kinds = drained
            .into_iter()
            .map(|(_, request)| request.complete(Err(Error::ConnectionClosed)))
            .collect();

        if count > 0 {
            debug!(count, "Failed pending requests");
        }
        kinds
    }

    /// Drops entries whose caller stopped waiting (reply timeout).
    ///
    /// Returns the kinds of the removed entries.
    pub fn purge_abandoned(&mut self) -> Vec<PendingKind> {
        let abandoned: Vec<MessageRef> = self
            .pending
            .iter()
            .filter(|(_, request)| request.is_abandoned())
            .map(|(message_ref, _)| *message_ref)
            .collect();

        abandoned
            .into_iter()
            .filter_map(|message_ref| self.pending.remove(&message_ref))
            .map(|request| request.kind)
            .collect()
    }

    /// Returns the number of outstanding requests.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
