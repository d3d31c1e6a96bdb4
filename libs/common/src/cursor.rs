//! Shared cursor data model and the JSON wire format spoken over the room socket.
//!
//! Clients send [`CursorState`] frames; the server answers with [`Update`] frames:
//!
//! ```json
//! {"type":"join","body":{"id":"client_01H…"}}
//! {"type":"update","body":{"id":"client_01H…","x":12.0,"y":40.5,"volume":0.02}}
//! {"type":"leave","body":{"id":"client_01H…"}}
//! ```

use serde::{Deserialize, Serialize};

/// Longest peer id accepted on the wire, in bytes.
pub const MAX_PEER_ID_LEN: usize = 128;

/// Last reported position and microphone level of one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub volume: f64,
}

impl CursorState {
    /// Zeroed state recorded for a peer that joined but has not reported yet.
    pub fn zeroed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            volume: 0.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Body of `join` and `leave` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: String,
}

/// Server → client room event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "lowercase")]
pub enum Update {
    /// Peer is now present in the room.
    Join(PeerRef),
    /// Peer's state was replaced wholesale.
    #[serde(rename = "update")]
    StateChanged(CursorState),
    /// Peer is no longer present.
    Leave(PeerRef),
}

impl Update {
    pub fn join(id: impl Into<String>) -> Self {
        Update::Join(PeerRef { id: id.into() })
    }

    pub fn leave(id: impl Into<String>) -> Self {
        Update::Leave(PeerRef { id: id.into() })
    }

    /// Id of the peer this event is about.
    pub fn peer_id(&self) -> &str {
        match self {
            Update::Join(peer) | Update::Leave(peer) => &peer.id,
            Update::StateChanged(state) => &state.id,
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Json)
    }

    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(FrameError::Json)
    }
}

/// Why an inbound frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("field `{0}` must be a finite number")]
    NotFinite(&'static str),

    #[error("volume must not be negative")]
    NegativeVolume,

    #[error("peer id must be between 1 and 128 bytes")]
    InvalidId,

    #[error("first frame must carry the peer id")]
    MissingId,
}

/// Client → server frame.
///
/// Same shape as [`CursorState`], but `id` may be omitted after the first frame
/// because the connection is already bound to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub volume: f64,
}

impl ClientFrame {
    /// Decode and validate one frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let frame: ClientFrame = serde_json::from_slice(bytes).map_err(FrameError::Json)?;
        frame.validate()?;
        Ok(frame)
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if !self.x.is_finite() {
            return Err(FrameError::NotFinite("x"));
        }
        if !self.y.is_finite() {
            return Err(FrameError::NotFinite("y"));
        }
        if !self.volume.is_finite() {
            return Err(FrameError::NotFinite("volume"));
        }
        if self.volume < 0.0 {
            return Err(FrameError::NegativeVolume);
        }
        if let Some(id) = &self.id {
            if id.is_empty() || id.len() > MAX_PEER_ID_LEN {
                return Err(FrameError::InvalidId);
            }
        }
        Ok(())
    }

    /// The full state this frame describes once the owning id is known.
    pub fn into_state(self, id: &str) -> CursorState {
        CursorState {
            id: id.to_string(),
            x: self.x,
            y: self.y,
            volume: self.volume,
        }
    }
}

impl From<&CursorState> for ClientFrame {
    fn from(state: &CursorState) -> Self {
        Self {
            id: Some(state.id.clone()),
            x: state.x,
            y: state.y,
            volume: state.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_uses_tagged_wire_format() {
        let join = serde_json::to_value(Update::join("a")).unwrap();
        assert_eq!(join, serde_json::json!({ "type": "join", "body": { "id": "a" } }));

        let changed = serde_json::to_value(Update::StateChanged(CursorState {
            id: "a".into(),
            x: 1.0,
            y: 2.0,
            volume: 0.5,
        }))
        .unwrap();
        assert_eq!(changed["type"], "update");
        assert_eq!(changed["body"]["x"], 1.0);
        assert_eq!(changed["body"]["volume"], 0.5);

        let leave = serde_json::to_value(Update::leave("a")).unwrap();
        assert_eq!(leave["type"], "leave");
    }

    #[test]
    fn update_decodes_leave_from_server_text() {
        let update = Update::from_json(r#"{"type":"leave","body":{"id":"b"}}"#).unwrap();
        assert_eq!(update, Update::leave("b"));
        assert_eq!(update.peer_id(), "b");
    }

    #[test]
    fn parse_accepts_frame_without_id() {
        let frame = ClientFrame::parse(br#"{"x":3,"y":4,"volume":0.1}"#).unwrap();
        assert!(frame.id.is_none());
        let state = frame.into_state("me");
        assert_eq!(state.id, "me");
        assert_eq!(state.position(), (3.0, 4.0));
    }

    #[test]
    fn parse_rejects_missing_fields() {
        let err = ClientFrame::parse(br#"{"x":3,"volume":0.1}"#).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn parse_rejects_non_numeric_coordinates() {
        let err = ClientFrame::parse(br#"{"x":"3","y":4,"volume":0}"#).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let err = ClientFrame::parse(br#"{"x":3,"y":4,"volume":0,"z":1}"#).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn parse_rejects_negative_volume() {
        let err = ClientFrame::parse(br#"{"x":3,"y":4,"volume":-0.5}"#).unwrap_err();
        assert!(matches!(err, FrameError::NegativeVolume));
    }

    #[test]
    fn parse_rejects_empty_and_oversized_ids() {
        let err = ClientFrame::parse(br#"{"id":"","x":0,"y":0,"volume":0}"#).unwrap_err();
        assert!(matches!(err, FrameError::InvalidId));

        let long = "a".repeat(MAX_PEER_ID_LEN + 1);
        let text = format!(r#"{{"id":"{long}","x":0,"y":0,"volume":0}}"#);
        let err = ClientFrame::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidId));
    }

    #[test]
    fn validate_rejects_nan() {
        let frame = ClientFrame {
            id: None,
            x: f64::NAN,
            y: 0.0,
            volume: 0.0,
        };
        assert!(matches!(frame.validate(), Err(FrameError::NotFinite("x"))));
    }

    #[test]
    fn frame_from_state_carries_id() {
        let state = CursorState::zeroed("me");
        let frame = ClientFrame::from(&state);
        assert_eq!(frame.id.as_deref(), Some("me"));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["id"], "me");
    }
}
