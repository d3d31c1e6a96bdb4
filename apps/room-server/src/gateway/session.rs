//! Per-connection room session: `Connecting → Joined → Closed`.

use proximity_common::cursor::FrameError;
use proximity_common::ClientFrame;

use super::events::{CLOSE_DUPLICATE_ID, CLOSE_MALFORMED_FRAME, CLOSE_UNKNOWN_PEER};
use super::fanout::Outbox;
use super::registry::{Membership, RoomDirectory};
use crate::error::RoomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket is open but has not sent a frame yet.
    Connecting,
    /// Bound to a peer id, subscribed, and present in the registry.
    Joined,
    /// Left the room. Terminal.
    Closed,
}

/// Why a session was closed by the server.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("frame id {got:?} does not match bound peer {bound:?}")]
    IdMismatch { bound: String, got: String },

    #[error("session already closed")]
    Closed,
}

impl SessionError {
    /// WebSocket close code reported to the client.
    pub fn close_code(&self) -> u16 {
        match self {
            SessionError::Frame(_) | SessionError::Closed => CLOSE_MALFORMED_FRAME,
            SessionError::Room(RoomError::DuplicateId(_)) => CLOSE_DUPLICATE_ID,
            SessionError::Room(RoomError::UnknownPeer(_)) | SessionError::IdMismatch { .. } => {
                CLOSE_UNKNOWN_PEER
            }
        }
    }
}

/// State for a single WebSocket connection.
pub struct RoomSession {
    /// Log-correlation id (`conn_` prefixed ULID).
    pub connection_id: String,
    /// Room this connection joins on its first frame.
    pub room: String,
    phase: SessionPhase,
    /// Handed to the room on join; the room then holds the only sender.
    outbox: Option<Outbox>,
    membership: Option<Membership>,
}

impl RoomSession {
    pub fn new(connection_id: String, room: String, outbox: Outbox) -> Self {
        Self {
            connection_id,
            room,
            phase: SessionPhase::Connecting,
            outbox: Some(outbox),
            membership: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Peer id bound by the first frame, while joined.
    pub fn peer_id(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.peer_id())
    }

    /// Apply one inbound frame.
    ///
    /// The first frame binds the connection to the frame's `id` and joins the
    /// room; every frame then replaces the peer's state. Any error closes the
    /// session before it is returned.
    pub fn handle_frame(
        &mut self,
        directory: &RoomDirectory,
        bytes: &[u8],
    ) -> Result<(), SessionError> {
        let result = self.apply(directory, bytes);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn apply(&mut self, directory: &RoomDirectory, bytes: &[u8]) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Closed {
            return Err(SessionError::Closed);
        }

        let frame = ClientFrame::parse(bytes)?;

        if self.membership.is_none() {
            // The first frame joins with its own state in one step, so the
            // room never holds a position this peer did not report.
            let peer_id = frame.id.clone().ok_or(FrameError::MissingId)?;
            let state = frame.into_state(&peer_id);
            let outbox = self.outbox.take().ok_or(SessionError::Closed)?;
            self.membership = Some(directory.enter(&self.room, state, outbox)?);
            self.phase = SessionPhase::Joined;
            return Ok(());
        }

        let membership = self.membership.as_ref().ok_or(SessionError::Closed)?;
        if let Some(id) = &frame.id {
            if id != membership.peer_id() {
                return Err(SessionError::IdMismatch {
                    bound: membership.peer_id().to_string(),
                    got: id.clone(),
                });
            }
        }

        let state = frame.into_state(membership.peer_id());
        membership.update(state)?;
        Ok(())
    }

    /// Leave the room and unsubscribe. Returns `true` only on the call that
    /// actually performed the cleanup.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        // Dropping the membership is the cleanup.
        self.membership.take();
        self.outbox.take();
        true
    }
}
