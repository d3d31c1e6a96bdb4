//! Read-only room inspection endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use proximity_common::CursorState;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::server::validate_room_name;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room}", get(get_room))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    pub room: String,
    pub members: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberState {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub volume: f64,
}

impl From<CursorState> for MemberState {
    fn from(c: CursorState) -> Self {
        Self {
            id: c.id,
            x: c.x,
            y: c.y,
            volume: c.volume,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    pub room: String,
    pub members: Vec<MemberState>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    responses((status = 200, description = "Live rooms", body = Vec<RoomSummary>)),
)]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state
        .rooms
        .list()
        .into_iter()
        .map(|(room, members)| RoomSummary { room, members })
        .collect();
    Json(rooms)
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room}",
    tag = "Rooms",
    params(("room" = String, Path, description = "Room name")),
    responses(
        (status = 200, description = "Current members of the room", body = RoomResponse),
        (status = 400, description = "Invalid room name", body = ApiErrorBody),
        (status = 404, description = "Room has no members", body = ApiErrorBody),
    ),
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    validate_room_name(&room)?;

    let handle = state
        .rooms
        .get(&room)
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    Ok(Json(RoomResponse {
        room: handle.name().to_string(),
        members: handle.snapshot().into_iter().map(MemberState::from).collect(),
    }))
}
