use proximity_common::{ClientFrame, CursorState};

/// Coalesces local state changes into at most one outbound write per tick.
///
/// Only the latest state is ever sent; intermediate positions are dropped.
#[derive(Debug)]
pub struct PositionFlusher {
    dirty: bool,
}

impl PositionFlusher {
    /// Starts dirty so the first tick sends the frame that joins the room.
    pub fn new() -> Self {
        Self { dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Frame to send on this tick, if anything changed since the last one.
    pub fn take(&mut self, current: &CursorState) -> Option<ClientFrame> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        Some(ClientFrame::from(current))
    }
}

impl Default for PositionFlusher {
    fn default() -> Self {
        Self::new()
    }
}
