use std::str::FromStr;
use std::time::Duration;

/// Room server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Room joined by sockets that connect to `/ws` without naming one.
    pub default_room: String,
    /// Per-connection outbound queue depth. Events beyond this are dropped
    /// for that connection only.
    pub outbound_queue_capacity: usize,
    /// How long a fresh socket may stay silent before its first frame.
    pub join_timeout: Duration,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// A joined socket with no inbound traffic (frames or pongs) for this
    /// long is closed.
    pub idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT", defaults.port),
            default_room: std::env::var("DEFAULT_ROOM")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.default_room),
            outbound_queue_capacity: parsed_var(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            )
            .max(1),
            join_timeout: Duration::from_secs(parsed_var(
                "JOIN_TIMEOUT_SECS",
                defaults.join_timeout.as_secs(),
            )),
            ping_interval: Duration::from_secs(
                parsed_var("PING_INTERVAL_SECS", defaults.ping_interval.as_secs()).max(1),
            ),
            idle_timeout: Duration::from_secs(parsed_var(
                "IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            default_room: "lobby".to_string(),
            outbound_queue_capacity: 1024,
            join_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(45),
        }
    }
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
