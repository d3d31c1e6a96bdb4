use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = proximity_common::id::prefixed_ulid("client");
/// assert!(id.starts_with("client_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Peer ids chosen by clients for the lifetime of one connection.
    pub const CLIENT: &str = "client";
    /// Server-side connection ids, used only for log correlation.
    pub const CONNECTION: &str = "conn";
    /// One media session between two peers.
    pub const CALL: &str = "call";
}

/// Peer id for a fresh client connection.
pub struct ClientId;

impl PrefixedId for ClientId {
    const PREFIX: &'static str = prefix::CLIENT;
}

/// Log-correlation id for one accepted WebSocket.
pub struct ConnectionId;

impl PrefixedId for ConnectionId {
    const PREFIX: &'static str = prefix::CONNECTION;
}

/// Identifies one media session, so late events from a closed call can be
/// told apart from the call that replaced it.
pub struct CallId;

impl PrefixedId for CallId {
    const PREFIX: &'static str = prefix::CALL;
}
