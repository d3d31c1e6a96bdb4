pub mod cursor;
pub mod id;
pub mod proximity;

pub use cursor::{ClientFrame, CursorState, FrameError, PeerRef, Update};
pub use id::PrefixedId;
pub use proximity::{distance, initiates, Falloff};
