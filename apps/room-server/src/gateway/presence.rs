//! Authoritative "who is in this room and where" for a single room.
//!
//! The registry owns its room's [`UpdateBroadcaster`] so that every mutation
//! and the event it produces happen in one step. Callers serialize access
//! (see [`super::registry::Room`]); nothing here is shared across rooms.

use std::collections::HashMap;

use proximity_common::{CursorState, Update};

use super::fanout::{Outbox, SubscriptionId, UpdateBroadcaster};
use crate::error::RoomError;

pub struct PresenceRegistry {
    cursors: HashMap<String, CursorState>,
    broadcaster: UpdateBroadcaster,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            cursors: HashMap::new(),
            broadcaster: UpdateBroadcaster::new(),
        }
    }

    pub fn subscribe(&mut self, outbox: Outbox) -> SubscriptionId {
        self.broadcaster.subscribe(outbox)
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.broadcaster.unsubscribe(subscription)
    }

    /// Add `state.id` with its first reported state and announce it.
    ///
    /// Everyone (including the joiner, as its ack) receives `Join{id}`. The
    /// joiner alone then receives a `Join` plus `StateChanged` for every
    /// member that was already present, and finally everyone receives the
    /// joiner's first `StateChanged`. No member is ever visible without a
    /// position it actually reported.
    pub fn join(
        &mut self,
        state: CursorState,
        subscription: SubscriptionId,
    ) -> Result<(), RoomError> {
        let id = state.id.clone();
        if self.cursors.contains_key(&id) {
            return Err(RoomError::DuplicateId(id));
        }

        self.broadcaster.publish(Update::join(id.clone()));

        let mut existing: Vec<&CursorState> = self.cursors.values().collect();
        existing.sort_by(|a, b| a.id.cmp(&b.id));
        for member in existing {
            self.broadcaster
                .send_to(subscription, Update::join(member.id.clone()));
            self.broadcaster
                .send_to(subscription, Update::StateChanged(member.clone()));
        }

        self.cursors.insert(id, state.clone());
        self.broadcaster.publish(Update::StateChanged(state));
        Ok(())
    }

    /// Replace the whole stored record for `id` and announce it.
    pub fn update(&mut self, id: &str, mut state: CursorState) -> Result<(), RoomError> {
        let slot = self
            .cursors
            .get_mut(id)
            .ok_or_else(|| RoomError::UnknownPeer(id.to_string()))?;
        state.id = id.to_string();
        *slot = state.clone();
        self.broadcaster.publish(Update::StateChanged(state));
        Ok(())
    }

    /// Remove `id` and announce it. Returns `false` (and emits nothing) if it
    /// was already gone.
    pub fn leave(&mut self, id: &str) -> bool {
        if self.cursors.remove(id).is_none() {
            return false;
        }
        self.broadcaster.publish(Update::leave(id));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cursors.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CursorState> {
        self.cursors.get(id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// No members and no subscribers.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty() && self.broadcaster.is_empty()
    }

    /// All members, sorted by id.
    pub fn snapshot(&self) -> Vec<CursorState> {
        let mut members: Vec<CursorState> = self.cursors.values().cloned().collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
