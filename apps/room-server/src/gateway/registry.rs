//! Directory of live rooms and the membership guard held by each joined connection.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use proximity_common::CursorState;

use super::fanout::{Outbox, SubscriptionId};
use super::presence::PresenceRegistry;
use crate::error::RoomError;

struct RoomState {
    registry: PresenceRegistry,
    /// Set once the room has been removed from the directory. A retired room
    /// never accepts new members.
    retired: bool,
}

/// One room: a presence registry behind its own mutex.
///
/// The mutex is the room's single-writer discipline. Every join, update, leave,
/// and the events they publish happen while it is held, and it is never held
/// across an `.await`.
pub struct Room {
    name: String,
    state: Mutex<RoomState>,
}

impl Room {
    fn new(name: String) -> Self {
        Self {
            name,
            state: Mutex::new(RoomState {
                registry: PresenceRegistry::new(),
                retired: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> Vec<CursorState> {
        self.state.lock().registry.snapshot()
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    fn update(&self, peer_id: &str, state: CursorState) -> Result<(), RoomError> {
        self.state.lock().registry.update(peer_id, state)
    }

    fn release(&self, peer_id: &str, subscription: SubscriptionId) {
        let mut state = self.state.lock();
        state.registry.leave(peer_id);
        state.registry.unsubscribe(subscription);
    }
}

/// Outcome of trying to enter a room that may have been retired concurrently.
enum Entry {
    Joined(SubscriptionId),
    Retired,
}

/// All rooms on this server, keyed by name.
///
/// Rooms are created on first join and dropped when the last member leaves.
/// The map itself is only touched to find a room; no lock is held across rooms.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<DashMap<String, Arc<Room>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `outbox` to `room` and join it as `state.id` at its first
    /// reported position, atomically.
    pub fn enter(
        &self,
        room: &str,
        state: CursorState,
        outbox: Outbox,
    ) -> Result<Membership, RoomError> {
        let peer_id = state.id.clone();
        loop {
            let handle = self
                .rooms
                .entry(room.to_string())
                .or_insert_with(|| Arc::new(Room::new(room.to_string())))
                .value()
                .clone();

            let entry = {
                let mut room_state = handle.state.lock();
                if room_state.retired {
                    Entry::Retired
                } else {
                    if room_state.registry.contains(&peer_id) {
                        return Err(RoomError::DuplicateId(peer_id));
                    }
                    let subscription = room_state.registry.subscribe(outbox.clone());
                    room_state.registry.join(state.clone(), subscription)?;
                    Entry::Joined(subscription)
                }
            };

            match entry {
                Entry::Joined(subscription) => {
                    tracing::debug!(room = %room, peer_id = %peer_id, "peer joined room");
                    return Ok(Membership {
                        directory: self.clone(),
                        room: handle,
                        peer_id,
                        subscription,
                    });
                }
                // Lost a race with `prune`; the next lookup creates a fresh room.
                Entry::Retired => continue,
            }
        }
    }

    pub fn get(&self, room: &str) -> Option<Arc<Room>> {
        self.rooms.get(room).map(|r| r.value().clone())
    }

    /// Names and member counts of all live rooms, sorted by name.
    pub fn list(&self) -> Vec<(String, usize)> {
        let mut rooms: Vec<(String, usize)> = self
            .rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().member_count()))
            .collect();
        rooms.sort();
        rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Drop `room` from the directory if nobody is in it.
    fn prune(&self, room: &str) {
        let removed = self.rooms.remove_if(room, |_, handle| {
            let mut state = handle.state.lock();
            if state.registry.is_empty() {
                state.retired = true;
                true
            } else {
                false
            }
        });
        if removed.is_some() {
            tracing::debug!(room = %room, "room emptied and removed");
        }
    }
}

/// Proof that a connection owns `peer_id` in a room.
///
/// Dropping it leaves the room and unsubscribes in one critical section, so
/// cleanup runs exactly once no matter which exit path drops it.
pub struct Membership {
    directory: RoomDirectory,
    room: Arc<Room>,
    peer_id: String,
    subscription: SubscriptionId,
}

impl Membership {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn room(&self) -> &str {
        self.room.name()
    }

    pub fn update(&self, state: CursorState) -> Result<(), RoomError> {
        self.room.update(&self.peer_id, state)
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.room.release(&self.peer_id, self.subscription);
        self.directory.prune(self.room.name());
        tracing::debug!(room = %self.room.name(), peer_id = %self.peer_id, "peer left room");
    }
}
