//! Local mirror of remote peers, rebuilt from the room's event stream.
//!
//! The mirror only learns what the server delivers. An event dropped under
//! backpressure is never resent, so the mirror can lag the room until the
//! connection is re-established.

use std::collections::BTreeMap;

use proximity_common::CursorState;

use crate::call::{CallPolicy, CallSessionManager, CallState};

/// Everything this client knows about one remote peer.
#[derive(Debug)]
pub struct PeerRecord {
    pub id: String,
    pub last_state: CursorState,
    pub calls: CallSessionManager,
}

impl PeerRecord {
    pub fn new(id: impl Into<String>, policy: CallPolicy) -> Self {
        let id = id.into();
        Self {
            last_state: CursorState::zeroed(id.clone()),
            calls: CallSessionManager::new(id.clone(), policy),
            id,
        }
    }

    pub fn dialed(&self) -> bool {
        self.calls.dialed()
    }

    pub fn call_state(&self) -> CallState {
        self.calls.state()
    }
}

#[derive(Debug)]
pub struct PeerStateCache {
    policy: CallPolicy,
    peers: BTreeMap<String, PeerRecord>,
}

impl PeerStateCache {
    pub fn new(policy: CallPolicy) -> Self {
        Self {
            policy,
            peers: BTreeMap::new(),
        }
    }

    /// Start tracking `id`. A repeated join keeps the existing record.
    pub fn join(&mut self, id: &str) -> bool {
        if self.peers.contains_key(id) {
            return false;
        }
        self.peers
            .insert(id.to_string(), PeerRecord::new(id, self.policy));
        true
    }

    /// Replace the stored state of a known peer. Unknown peers are ignored.
    pub fn apply(&mut self, state: CursorState) -> Option<&mut PeerRecord> {
        let record = self.peers.get_mut(&state.id)?;
        record.last_state = state;
        Some(record)
    }

    /// Forget `id`, closing any session it had. Returns the discarded record.
    pub fn leave(&mut self, id: &str) -> Option<PeerRecord> {
        let mut record = self.peers.remove(id)?;
        record.calls.close();
        Some(record)
    }

    /// Close every session and forget every peer. Returns how many sessions
    /// were closed.
    pub fn clear(&mut self) -> usize {
        let closed = self
            .peers
            .values_mut()
            .map(|record| record.calls.close())
            .filter(|closed| *closed)
            .count();
        self.peers.clear();
        closed
    }

    pub fn get(&self, id: &str) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PeerRecord> {
        self.peers.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerRecord> {
        self.peers.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::testing::FakeDialer;

    fn cache() -> PeerStateCache {
        PeerStateCache::new(CallPolicy::new(500.0, 0.1, 0.0))
    }

    #[test]
    fn join_creates_zeroed_record_once() {
        let mut cache = cache();
        assert!(cache.join("A"));
        cache.apply(CursorState {
            id: "A".into(),
            x: 5.0,
            y: 5.0,
            volume: 0.0,
        });
        assert!(!cache.join("A"));

        let record = cache.get("A").unwrap();
        assert_eq!(record.last_state.x, 5.0);
        assert_eq!(record.call_state(), CallState::Idle);
        assert!(!record.dialed());
    }

    #[test]
    fn apply_for_unknown_peer_is_ignored() {
        let mut cache = cache();
        assert!(cache.apply(CursorState::zeroed("ghost")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn leave_closes_session_and_discards() {
        let mut cache = cache();
        let mut dialer = FakeDialer::default();
        cache.join("A");
        let record = cache.get_mut("A").unwrap();
        record
            .calls
            .evaluate("B", (0.0, 0.0), &CursorState::zeroed("A"), &mut dialer);
        let call_id = dialer.last_call_id("A").unwrap();
        assert!(record.calls.on_established(&call_id));

        let gone = cache.leave("A").unwrap();
        assert_eq!(gone.call_state(), CallState::Idle);
        drop(gone);

        assert!(!cache.contains("A"));
        assert!(cache.leave("A").is_none());
        assert_eq!(dialer.closes_for("A"), 1);
    }

    #[test]
    fn clear_counts_closed_sessions() {
        let mut cache = cache();
        let mut dialer = FakeDialer::default();
        for id in ["A", "B", "C"] {
            cache.join(id);
        }
        // Only peers sorting before "Z" are dialed by "Z"; all three are.
        for record in cache.iter_mut() {
            let peer = record.last_state.clone();
            record.calls.evaluate("Z", (0.0, 0.0), &peer, &mut dialer);
        }

        assert_eq!(cache.clear(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.clear(), 0);
    }
}
