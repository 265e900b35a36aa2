use std::sync::Arc;

use crate::config::AppConfig;
use crate::ws::RoomManager;

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState {
    /// Room membership table. The only mutable state the relay keeps.
    pub rooms: Arc<RoomManager>,
    pub config: AppConfig,
    pub start_time: std::time::Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(AppState {
            rooms: RoomManager::new(),
            config,
            start_time: std::time::Instant::now(),
        })
    }
}
