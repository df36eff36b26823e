//! Multiplayer room endpoints: create, join, shared text, result
//! submission, and the per-room leaderboard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::auth::AuthUser;
use super::error::{ApiError, MsgResponse};
use crate::db::{Participant, Room};
use crate::AppState;

const ROOM_TEXT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const ROOM_LEADERBOARD_CACHE_TTL: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub code: String,
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::validation_field("text", "Room text is required"));
    }

    let room = Room::create(&state.db, &user.id, &req.text).await?;
    tracing::info!(code = %room.code, host_id = %user.id, "Room created");

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse { code: room.code }),
    ))
}

/// POST /api/rooms/:code/join
///
/// Idempotent: rejoining an already-joined room succeeds without creating
/// a second participant.
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(code): Path<String>,
) -> Result<Json<MsgResponse>, ApiError> {
    let room = Room::find_active_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found or is no longer active"))?;

    Participant::get_or_create(&state.db, &room.id, &user.id).await?;

    Ok(Json(MsgResponse::new(format!(
        "Joined room {} successfully",
        code
    ))))
}

/// GET /api/rooms/:code/text
pub async fn room_text(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("room_text:{}", code);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let room = Room::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    let data = serde_json::json!({ "text": room.text });
    state.cache.put(cache_key, data.clone(), ROOM_TEXT_CACHE_TTL);
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
pub struct SubmitResultRequest {
    pub wpm: Option<f64>,
    pub accuracy: Option<f64>,
}

/// POST /api/rooms/:code/results
pub async fn submit_result(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(code): Path<String>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<Json<MsgResponse>, ApiError> {
    let room = Room::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    if Participant::find(&state.db, &room.id, &user.id).await?.is_none() {
        return Err(ApiError::bad_request(
            "You are not a participant in this room",
        ));
    }

    Participant::submit_result(&state.db, &room.id, &user.id, req.wpm, req.accuracy).await?;
    tracing::info!(code = %code, user_id = %user.id, "Room result recorded");

    Ok(Json(MsgResponse::new("Your result has been recorded")))
}

/// GET /api/rooms/:code/leaderboard (public)
pub async fn room_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("room_leaderboard:{}", code);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let room = Room::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    let entries = Participant::leaderboard(&state.db, &room.id).await?;
    if entries.is_empty() {
        return Err(ApiError::not_found("No results submitted yet"));
    }

    let data = serde_json::to_value(&entries).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize response");
        ApiError::internal("Something went wrong. Try again later.")
    })?;
    state
        .cache
        .put(cache_key, data.clone(), ROOM_LEADERBOARD_CACHE_TTL);
    Ok(Json(data))
}
