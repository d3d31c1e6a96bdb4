//! Distance-driven media session lifecycle for one remote peer.
//!
//! Every peer runs the same rules against the same shared positions, so two
//! peers in range agree on a single caller without talking to each other:
//!
//! ```text
//! Idle ──(in range, we initiate)──▶ Dialing ──(established)──▶ Active
//!   ▲                                  │                         │
//!   └────(out of range / failure / peer left / shutdown)─────────┘
//! ```
//!
//! The media transport itself lives behind [`MediaDialer`] and [`MediaCall`].

use proximity_common::id::{CallId, PrefixedId};
use proximity_common::{distance, initiates, CursorState, Falloff};

/// Why the media layer could not provide a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("media backend unavailable: {0}")]
    Unavailable(String),

    #[error("peer {0} did not answer")]
    NoAnswer(String),

    #[error("call with {0} dropped")]
    Dropped(String),
}

/// One live media session as seen by the transport.
pub trait MediaCall: Send {
    /// Output gain in `0.0..=1.0`.
    fn set_gain(&mut self, gain: f64);

    fn close(&mut self);
}

/// Originates outbound media sessions.
pub trait MediaDialer {
    /// Start dialing `peer_id`. Establishment or failure is reported later as
    /// a [`MediaEvent`](crate::client::MediaEvent) carrying `call_id`.
    fn dial(&mut self, peer_id: &str, call_id: &str) -> Result<Box<dyn MediaCall>, MediaError>;
}

/// Exclusive handle to a media session. Closing is idempotent and also
/// happens on drop.
pub struct CallSession {
    id: String,
    call: Option<Box<dyn MediaCall>>,
}

impl CallSession {
    pub fn new(id: impl Into<String>, call: Box<dyn MediaCall>) -> Self {
        Self {
            id: id.into(),
            call: Some(call),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_gain(&mut self, gain: f64) {
        if let Some(call) = self.call.as_mut() {
            call.set_gain(gain);
        }
    }

    /// Returns `true` only on the call that actually closed the session.
    pub fn close(&mut self) -> bool {
        match self.call.take() {
            Some(mut call) => {
                call.close();
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.call.is_none()
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Dialing,
    Active,
}

/// Range and falloff settings shared by every manager on a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallPolicy {
    pub audio: Falloff,
    pub visual: Falloff,
}

impl CallPolicy {
    pub fn new(max_distance: f64, audio_floor: f64, visual_floor: f64) -> Self {
        Self {
            audio: Falloff::new(max_distance, audio_floor),
            visual: Falloff::new(max_distance, visual_floor),
        }
    }

    pub fn max_distance(&self) -> f64 {
        self.audio.max_distance
    }

    pub fn in_range(&self, d: f64) -> bool {
        d < self.max_distance()
    }
}

/// Session state machine for one remote peer.
#[derive(Debug)]
pub struct CallSessionManager {
    peer_id: String,
    policy: CallPolicy,
    state: CallState,
    session: Option<CallSession>,
    dialed: bool,
    gain: f64,
    opacity: f64,
}

impl CallSessionManager {
    pub fn new(peer_id: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            peer_id: peer_id.into(),
            gain: policy.audio.floor,
            opacity: policy.visual.floor,
            policy,
            state: CallState::Idle,
            session: None,
            dialed: false,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Id of the current session, if any.
    pub fn call_id(&self) -> Option<&str> {
        self.session.as_ref().map(CallSession::id)
    }

    /// Whether `call_id` names the current session.
    fn is_current(&self, call_id: &str) -> bool {
        self.call_id() == Some(call_id)
    }

    /// Whether this side originated the current session.
    pub fn dialed(&self) -> bool {
        self.dialed
    }

    /// Audio gain from the last evaluation.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Visual emphasis from the last evaluation.
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Re-run the transition rules for our position against the peer's last
    /// reported state.
    pub fn evaluate(
        &mut self,
        self_id: &str,
        own_position: (f64, f64),
        peer: &CursorState,
        dialer: &mut dyn MediaDialer,
    ) -> CallState {
        let d = distance(own_position, peer.position());
        self.gain = self.policy.audio.gain(d);
        self.opacity = self.policy.visual.gain(d);

        if !self.policy.in_range(d) {
            if self.state != CallState::Idle {
                tracing::debug!(peer_id = %self.peer_id, distance = d, "peer out of range");
                self.close();
            }
            return self.state;
        }

        match self.state {
            CallState::Idle if initiates(self_id, &self.peer_id) => self.dial(dialer),
            CallState::Active => {
                if let Some(session) = self.session.as_mut() {
                    session.set_gain(self.gain);
                }
            }
            CallState::Idle | CallState::Dialing => {}
        }
        self.state
    }

    fn dial(&mut self, dialer: &mut dyn MediaDialer) {
        let call_id = CallId::generate();
        match dialer.dial(&self.peer_id, &call_id) {
            Ok(call) => {
                tracing::debug!(peer_id = %self.peer_id, call_id = %call_id, "dialing peer");
                self.session = Some(CallSession::new(call_id, call));
                self.state = CallState::Dialing;
                self.dialed = true;
            }
            // Stay idle; the next in-range evaluation tries again.
            Err(e) => tracing::warn!(peer_id = %self.peer_id, error = %e, "dial failed"),
        }
    }

    /// The outbound call `call_id` was answered. Returns `false` if it is not
    /// the pending dial, e.g. a late answer for a call already closed.
    pub fn on_established(&mut self, call_id: &str) -> bool {
        if self.state != CallState::Dialing || !self.is_current(call_id) {
            return false;
        }
        self.state = CallState::Active;
        if let Some(session) = self.session.as_mut() {
            session.set_gain(self.gain);
        }
        true
    }

    /// The media layer gave up on session `call_id`. Back to `Idle`, so the
    /// next in-range evaluation dials again. Returns `false` and changes
    /// nothing if `call_id` is not the current session.
    pub fn on_failed(&mut self, call_id: &str, error: &MediaError) -> bool {
        if !self.is_current(call_id) {
            tracing::debug!(
                peer_id = %self.peer_id,
                call_id = %call_id,
                "failure for stale call ignored"
            );
            return false;
        }
        tracing::info!(
            peer_id = %self.peer_id,
            call_id = %call_id,
            error = %error,
            "call failed"
        );
        self.close();
        true
    }

    /// Answer a call the peer placed. Any stale session is replaced.
    pub fn accept_incoming(&mut self, call_id: impl Into<String>, call: Box<dyn MediaCall>) {
        if let Some(mut stale) = self.session.take() {
            stale.close();
        }
        let mut session = CallSession::new(call_id, call);
        session.set_gain(self.gain);
        self.session = Some(session);
        self.state = CallState::Active;
        self.dialed = false;
    }

    /// Close any session and return to `Idle`. Returns `true` only if a
    /// session was actually closed.
    pub fn close(&mut self) -> bool {
        let closed = self
            .session
            .take()
            .map(|mut session| session.close())
            .unwrap_or(false);
        self.state = CallState::Idle;
        self.dialed = false;
        closed
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Shared record of what the fake media layer was asked to do.
    #[derive(Debug, Default)]
    pub struct MediaLog {
        pub dials: Vec<String>,
        /// `(peer, call id)` per successful dial.
        pub call_ids: Vec<(String, String)>,
        pub closes: Vec<String>,
        pub gains: Vec<(String, f64)>,
        pub refuse: HashSet<String>,
    }

    #[derive(Clone, Default)]
    pub struct FakeDialer {
        pub log: Arc<Mutex<MediaLog>>,
    }

    impl FakeDialer {
        pub fn call_for(&self, peer_id: &str) -> Box<dyn MediaCall> {
            Box::new(FakeCall {
                peer_id: peer_id.to_string(),
                log: Arc::clone(&self.log),
            })
        }

        pub fn closes_for(&self, peer_id: &str) -> usize {
            let log = self.log.lock().unwrap();
            log.closes.iter().filter(|p| *p == peer_id).count()
        }

        pub fn dials_for(&self, peer_id: &str) -> usize {
            let log = self.log.lock().unwrap();
            log.dials.iter().filter(|p| *p == peer_id).count()
        }

        pub fn last_call_id(&self, peer_id: &str) -> Option<String> {
            let log = self.log.lock().unwrap();
            log.call_ids
                .iter()
                .rev()
                .find(|(p, _)| p == peer_id)
                .map(|(_, id)| id.clone())
        }

        pub fn last_gain(&self, peer_id: &str) -> Option<f64> {
            let log = self.log.lock().unwrap();
            log.gains
                .iter()
                .rev()
                .find(|(p, _)| p == peer_id)
                .map(|(_, g)| *g)
        }
    }

    impl MediaDialer for FakeDialer {
        fn dial(
            &mut self,
            peer_id: &str,
            call_id: &str,
        ) -> Result<Box<dyn MediaCall>, MediaError> {
            let mut log = self.log.lock().unwrap();
            if log.refuse.contains(peer_id) {
                return Err(MediaError::Unavailable("refused".into()));
            }
            log.dials.push(peer_id.to_string());
            log.call_ids.push((peer_id.to_string(), call_id.to_string()));
            drop(log);
            Ok(self.call_for(peer_id))
        }
    }

    pub struct FakeCall {
        peer_id: String,
        log: Arc<Mutex<MediaLog>>,
    }

    impl MediaCall for FakeCall {
        fn set_gain(&mut self, gain: f64) {
            self.log
                .lock()
                .unwrap()
                .gains
                .push((self.peer_id.clone(), gain));
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closes.push(self.peer_id.clone());
        }
    }
}
