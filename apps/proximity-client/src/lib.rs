//! Proximity chat client: mirrors a room's cursors and opens a media call to
//! every peer within range.

pub mod cache;
pub mod call;
pub mod client;
pub mod config;
pub mod connection;
pub mod flush;

pub use cache::{PeerRecord, PeerStateCache};
pub use call::{
    CallPolicy, CallSession, CallSessionManager, CallState, MediaCall, MediaDialer, MediaError,
};
pub use client::{MediaEvent, ProximityClient};
pub use config::ClientConfig;
pub use connection::{ClientError, LocalEvent};
