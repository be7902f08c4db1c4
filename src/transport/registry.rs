//! Channel membership registry.
//!
//! Tracks, per channel, the join reference used to tag subsequent
//! messages and where the membership is in its lifecycle:
//!
//! ```text
//! Unjoined → Joining → Joined → Leaving → Unjoined
//! ```
//!
//! Every state collapses to `Unjoined` when the connection closes.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::{ChannelId, JoinRef};

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle stage of a channel membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Join sent, reply pending.
    Joining,
    /// Join confirmed by the server.
    Joined,
    /// Leave sent, reply pending.
    Leaving,
}

/// One channel membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// Reference of the join that created this membership.
    pub join_ref: JoinRef,
    /// Current lifecycle stage.
    pub state: ChannelState,
}

// ============================================================================
// ChannelRegistry
// ============================================================================

/// Membership map keyed by channel id.
///
/// At most one membership per channel; a second join replaces the first.
#[derive(Debug, Default)]
pub(crate) struct ChannelRegistry {
    channels: FxHashMap<ChannelId, Membership>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a provisional membership before the join is sent.
    pub fn begin_join(&mut self, channel_id: ChannelId, join_ref: JoinRef) {
        if let Some(previous) = self.channels.insert(
            channel_id.clone(),
            Membership {
                join_ref,
                state: ChannelState::Joining,
            },
        ) {
            debug!(%channel_id, previous = %previous.join_ref, "Replacing existing membership");
        }
    }

    /// Marks the membership created by `join_ref` as joined.
    pub fn confirm_join(&mut self, channel_id: &ChannelId, join_ref: JoinRef) {
        if let Some(membership) = self.channels.get_mut(channel_id)
            && membership.join_ref == join_ref
        {
            membership.state = ChannelState::Joined;
        }
    }

    /// Removes the provisional membership created by `join_ref`.
    ///
    /// A newer join on the same channel is left untouched.
    pub fn rollback_join(&mut self, channel_id: &ChannelId, join_ref: JoinRef) {
        if self
            .channels
            .get(channel_id)
            .is_some_and(|membership| membership.join_ref == join_ref)
        {
            self.channels.remove(channel_id);
            debug!(%channel_id, %join_ref, "Join rolled back");
        }
    }

    /// Returns the join reference of a membership, in any state.
    #[inline]
    pub fn join_ref(&self, channel_id: &ChannelId) -> Option<JoinRef> {
        self.get(channel_id).map(|m| m.join_ref)
    }

    /// Marks a membership as leaving.
    ///
    /// Returns the membership as it was before the leave.
    pub fn begin_leave(&mut self, channel_id: &ChannelId) -> Option<Membership> {
        let membership = self.channels.get_mut(channel_id)?;
        let before = *membership;
        membership.state = ChannelState::Leaving;
        Some(before)
    }

    /// Finishes the leave of `left`, the membership returned by
    /// [`begin_leave`](Self::begin_leave).
    ///
    /// Removes it on success and restores its prior state on failure.
    /// A membership created by a later join is left untouched.
    pub fn complete_leave(&mut self, channel_id: &ChannelId, left: Membership, success: bool) {
        let Some(membership) = self.channels.get_mut(channel_id) else {
            return;
        };
        if membership.join_ref != left.join_ref {
            debug!(%channel_id, stale = %left.join_ref, current = %membership.join_ref, "Leave settled for replaced membership");
            return;
        }

        if success {
            self.channels.remove(channel_id);
        } else if membership.state == ChannelState::Leaving {
            membership.state = left.state;
        }
    }

    /// Returns the membership of a channel.
    #[inline]
    pub fn get(&self, channel_id: &ChannelId) -> Option<Membership> {
        self.channels.get(channel_id).copied()
    }

    /// Returns a snapshot of all memberships, sorted by channel id.
    pub fn snapshot(&self) -> Vec<(ChannelId, Membership)> {
        let mut channels: Vec<_> = self
            .channels
            .iter()
            .map(|(id, membership)| (id.clone(), *membership))
            .collect();
        channels.sort_by(|a, b| a.0.cmp(&b.0));
        channels
    }

    /// Returns every channel id.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.snapshot().into_iter().map(|(id, _)| id).collect()
    }

    /// Drops every membership.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
