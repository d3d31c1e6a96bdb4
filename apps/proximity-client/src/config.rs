use std::str::FromStr;
use std::time::Duration;

use proximity_common::proximity::DEFAULT_MAX_DISTANCE;

/// Client configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base WebSocket URL of the room server, e.g. `ws://localhost:5000`.
    pub server_url: String,
    pub room: String,
    /// Peers closer than this are in call range.
    pub max_distance: f64,
    /// Lowest audio gain applied to an active call.
    pub audio_gain_floor: f64,
    /// Lowest visual emphasis given to a remote cursor.
    pub visual_floor: f64,
    /// At most one position write is sent per interval.
    pub flush_interval: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: non_empty_var("SERVER_URL").unwrap_or(defaults.server_url),
            room: non_empty_var("ROOM").unwrap_or(defaults.room),
            max_distance: positive(parsed_var("MAX_DISTANCE", defaults.max_distance))
                .unwrap_or(defaults.max_distance),
            audio_gain_floor: parsed_var("AUDIO_GAIN_FLOOR", defaults.audio_gain_floor)
                .clamp(0.0, 1.0),
            visual_floor: parsed_var("VISUAL_FLOOR", defaults.visual_floor).clamp(0.0, 1.0),
            flush_interval: Duration::from_millis(
                parsed_var("FLUSH_INTERVAL_MS", defaults.flush_interval.as_millis() as u64)
                    .max(1),
            ),
        }
    }

    /// Socket URL for the configured room.
    pub fn room_url(&self) -> String {
        format!("{}/ws/{}", self.server_url.trim_end_matches('/'), self.room)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:5000".to_string(),
            room: "lobby".to_string(),
            max_distance: DEFAULT_MAX_DISTANCE,
            audio_gain_floor: 0.1,
            visual_floor: 0.0,
            flush_interval: Duration::from_millis(100),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_url_joins_base_and_room() {
        let config = ClientConfig {
            server_url: "ws://example.test:5000/".to_string(),
            room: "alpha".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.room_url(), "ws://example.test:5000/ws/alpha");
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.max_distance, 500.0);
        assert_eq!(config.audio_gain_floor, 0.1);
        assert_eq!(config.visual_floor, 0.0);
        assert_eq!(config.flush_interval, Duration::from_millis(100));
    }
}
