//! Single-threaded client state: own cursor, peer mirror and call managers.
//!
//! Every handler runs to completion without suspending, so a transition is
//! never observed half-applied.

use proximity_common::{ClientFrame, CursorState, Update};

use crate::cache::{PeerRecord, PeerStateCache};
use crate::call::{CallPolicy, MediaCall, MediaDialer, MediaError};
use crate::config::ClientConfig;
use crate::flush::PositionFlusher;

/// Something the media layer reports back about a peer.
///
/// `call_id` names the session the event belongs to: the id handed to
/// [`MediaDialer::dial`] for outbound calls, or the caller's id for incoming
/// ones. Events for a session that has since been replaced are ignored.
pub enum MediaEvent {
    /// An outbound dial was answered.
    Established { peer_id: String, call_id: String },
    /// A dial or live call failed or was hung up remotely.
    Failed {
        peer_id: String,
        call_id: String,
        error: MediaError,
    },
    /// The peer dialed us.
    Incoming {
        peer_id: String,
        call_id: String,
        call: Box<dyn MediaCall>,
    },
}

impl MediaEvent {
    pub fn peer_id(&self) -> &str {
        match self {
            MediaEvent::Established { peer_id, .. }
            | MediaEvent::Failed { peer_id, .. }
            | MediaEvent::Incoming { peer_id, .. } => peer_id,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            MediaEvent::Established { call_id, .. }
            | MediaEvent::Failed { call_id, .. }
            | MediaEvent::Incoming { call_id, .. } => call_id,
        }
    }
}

pub struct ProximityClient<D> {
    me: CursorState,
    peers: PeerStateCache,
    flusher: PositionFlusher,
    dialer: D,
}

impl<D: MediaDialer> ProximityClient<D> {
    pub fn new(id: impl Into<String>, config: &ClientConfig, dialer: D) -> Self {
        let policy = CallPolicy::new(
            config.max_distance,
            config.audio_gain_floor,
            config.visual_floor,
        );
        Self {
            me: CursorState::zeroed(id),
            peers: PeerStateCache::new(policy),
            flusher: PositionFlusher::new(),
            dialer,
        }
    }

    pub fn id(&self) -> &str {
        &self.me.id
    }

    pub fn state(&self) -> &CursorState {
        &self.me
    }

    pub fn peers(&self) -> &PeerStateCache {
        &self.peers
    }

    pub fn peer(&self, id: &str) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Apply one room event from the server.
    pub fn handle_update(&mut self, update: Update) {
        if update.peer_id() == self.me.id {
            return;
        }

        match update {
            Update::Join(peer) => {
                if self.peers.join(&peer.id) {
                    tracing::debug!(peer_id = %peer.id, "peer joined");
                }
            }
            Update::StateChanged(state) => {
                let own = self.me.position();
                let Some(record) = self.peers.apply(state) else {
                    tracing::debug!("state for unknown peer ignored");
                    return;
                };
                record
                    .calls
                    .evaluate(&self.me.id, own, &record.last_state, &mut self.dialer);
            }
            Update::Leave(peer) => {
                if self.peers.leave(&peer.id).is_some() {
                    tracing::debug!(peer_id = %peer.id, "peer left");
                }
            }
        }
    }

    /// Move our cursor and re-evaluate every peer against the new position.
    pub fn move_to(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() || (x, y) == self.me.position() {
            return;
        }
        self.me.x = x;
        self.me.y = y;
        self.flusher.mark_dirty();

        let own = self.me.position();
        for record in self.peers.iter_mut() {
            record
                .calls
                .evaluate(&self.me.id, own, &record.last_state, &mut self.dialer);
        }
    }

    /// Record a new microphone level. Sent with the next flush.
    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.max(0.0);
        if volume != self.me.volume {
            self.me.volume = volume;
            self.flusher.mark_dirty();
        }
    }

    /// Timer tick: the frame to send, if our state changed since the last one.
    pub fn flush(&mut self) -> Option<ClientFrame> {
        self.flusher.take(&self.me)
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        let Some(record) = self.peers.get_mut(event.peer_id()) else {
            tracing::debug!(peer_id = %event.peer_id(), "media event for unknown peer");
            if let MediaEvent::Incoming { mut call, .. } = event {
                call.close();
            }
            return;
        };

        match event {
            MediaEvent::Established { peer_id, call_id } => {
                if record.calls.on_established(&call_id) {
                    tracing::info!(peer_id = %peer_id, call_id = %call_id, "call established");
                } else {
                    tracing::debug!(peer_id = %peer_id, call_id = %call_id, "stale answer ignored");
                }
            }
            MediaEvent::Failed { call_id, error, .. } => {
                record.calls.on_failed(&call_id, &error);
            }
            MediaEvent::Incoming {
                peer_id,
                call_id,
                call,
            } => {
                tracing::info!(peer_id = %peer_id, call_id = %call_id, "answering call");
                record.calls.accept_incoming(call_id, call);
            }
        }
    }

    /// Close every session and forget every peer. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.peers.clear();
        if closed > 0 {
            tracing::info!(closed, "closed calls on shutdown");
        }
        closed
    }
}

impl<D> Drop for ProximityClient<D> {
    fn drop(&mut self) {
        self.peers.clear();
    }
}
