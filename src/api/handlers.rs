use axum::Json;
use axum::extract::{Path, State};

use super::errors::ApiError;
use super::models::*;
use super::state::SharedState;

// =========================================================================
// Health
// =========================================================================

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "score-relay".to_string(),
        uptime,
        connections: state.rooms.total_connections().await,
    })
}

// =========================================================================
// Rooms
// =========================================================================

/// GET /api/rooms
pub async fn list_rooms(State(state): State<SharedState>) -> Json<RoomListResponse> {
    let rooms: Vec<RoomSummary> = state
        .rooms
        .active_rooms()
        .await
        .into_iter()
        .map(|(name, members)| RoomSummary { name, members })
        .collect();
    let total = rooms.len();
    Json(RoomListResponse { rooms, total })
}

/// GET /api/rooms/{room}
pub async fn get_room(
    Path(room): Path<String>,
    State(state): State<SharedState>,
) -> Result<Json<RoomSummary>, ApiError> {
    match state.rooms.room_size(&room).await {
        0 => Err(ApiError::RoomNotFound(room)),
        members => Ok(Json(RoomSummary {
            name: room,
            members,
        })),
    }
}
