//! Close codes and outbound framing for the room socket.

use axum::extract::ws::{CloseFrame, Message};
use proximity_common::{FrameError, Update};

// ---------------------------------------------------------------------------
// Close codes (4000-range for application-level)
// ---------------------------------------------------------------------------

/// Frame failed to decode or validate.
pub const CLOSE_MALFORMED_FRAME: u16 = 4000;
/// Update for a peer the room does not know, or for a different peer than
/// the one this connection is bound to.
pub const CLOSE_UNKNOWN_PEER: u16 = 4001;
/// Peer id already owned by another live connection in the room.
pub const CLOSE_DUPLICATE_ID: u16 = 4004;
/// No first frame before the join deadline, or no traffic before the idle deadline.
pub const CLOSE_TIMEOUT: u16 = 4009;

// ---------------------------------------------------------------------------
// Server → Client frames
// ---------------------------------------------------------------------------

/// Encode a room event as a text frame.
pub fn update_message(update: &Update) -> Result<Message, FrameError> {
    Ok(Message::Text(update.to_json()?.into()))
}

/// Control frame payloads are capped at 125 bytes, two of which hold the code.
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Build a close frame with an application close code.
pub fn close_message(code: u16, reason: &str) -> Message {
    let mut end = reason.len().min(MAX_CLOSE_REASON_BYTES);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    Message::Close(Some(CloseFrame {
        code,
        reason: reason[..end].to_string().into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_message_is_tagged_json_text() {
        let msg = update_message(&Update::leave("A")).unwrap();
        match msg {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(value["type"], "leave");
                assert_eq!(value["body"]["id"], "A");
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn close_message_carries_code() {
        match close_message(CLOSE_DUPLICATE_ID, "taken") {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CLOSE_DUPLICATE_ID);
                assert_eq!(frame.reason.as_str(), "taken");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[test]
    fn close_reason_is_truncated_on_a_char_boundary() {
        let reason = "é".repeat(100);
        match close_message(CLOSE_MALFORMED_FRAME, &reason) {
            Message::Close(Some(frame)) => {
                assert!(frame.reason.as_str().len() <= MAX_CLOSE_REASON_BYTES);
                assert!(frame.reason.as_str().chars().all(|c| c == 'é'));
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
