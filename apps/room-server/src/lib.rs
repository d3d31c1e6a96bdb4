pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::registry::RoomDirectory;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomDirectory,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomDirectory::new(),
            config: Arc::new(config),
        }
    }
}
