//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    services::{CreateMessage, CreateTimer, RoomSettingsUpdate, UpdateMessage, UpdateTimer},
    state::{AppState, Message, Room, RoomStatus, Timer},
};

use super::{
    requests::TimerControlRequest,
    responses::{ApiError, ApiResponse, HealthResponse},
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

fn control(body: Option<Json<TimerControlRequest>>) -> TimerControlRequest {
    body.map(|Json(request)| request).unwrap_or_default()
}

/// Handle POST /api/v1/rooms
pub async fn create_room_handler(State(state): State<Arc<AppState>>) -> Created<Room> {
    created(state.create_room().await?)
}

/// Handle GET /api/v1/rooms/:room_id
pub async fn get_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> ApiResult<Room> {
    ok(state.open_room(&room_id).await?)
}

/// Handle GET /api/v1/rooms/:room_id/status
pub async fn room_status_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> ApiResult<RoomStatus> {
    ok(state.room_status(&room_id).await?)
}

/// Handle PUT /api/v1/rooms/:room_id/settings
pub async fn update_room_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(update): Json<RoomSettingsUpdate>,
) -> ApiResult<Room> {
    ok(state.update_room_settings(&room_id, update).await?)
}

/// Handle DELETE /api/v1/rooms/:room_id
pub async fn delete_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> ApiResult<String> {
    state.delete_room(&room_id).await?;
    ok(format!("Room {} deleted", room_id))
}

/// Handle POST /api/v1/rooms/:room_id/timers
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<CreateTimer>,
) -> Created<Timer> {
    created(state.timers.create_timer(&room_id, request).await?)
}

/// Handle PUT /api/v1/rooms/:room_id/timers/:timer_id
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
    Json(update): Json<UpdateTimer>,
) -> ApiResult<Timer> {
    ok(state.timers.update_timer(&room_id, &timer_id, update).await?)
}

/// Handle DELETE /api/v1/rooms/:room_id/timers/:timer_id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
) -> ApiResult<String> {
    state.timers.delete_timer(&room_id, &timer_id).await?;
    ok(format!("Timer {} deleted", timer_id))
}

/// Handle POST /api/v1/rooms/:room_id/timers/:timer_id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
    body: Option<Json<TimerControlRequest>>,
) -> ApiResult<Timer> {
    let request = control(body);
    ok(state
        .timers
        .start_timer(&room_id, &timer_id, request.start_time)
        .await?)
}

/// Handle POST /api/v1/rooms/:room_id/timers/:timer_id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
) -> ApiResult<Timer> {
    ok(state.timers.pause_timer(&room_id, &timer_id).await?)
}

/// Handle POST /api/v1/rooms/:room_id/timers/:timer_id/stop
pub async fn stop_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
) -> ApiResult<Timer> {
    ok(state.timers.stop_timer(&room_id, &timer_id).await?)
}

/// Handle POST /api/v1/rooms/:room_id/timers/:timer_id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
    body: Option<Json<TimerControlRequest>>,
) -> ApiResult<Timer> {
    let request = control(body);
    ok(state
        .timers
        .reset_timer(&room_id, &timer_id, request.duration)
        .await?)
}

/// Handle POST /api/v1/rooms/:room_id/timers/:timer_id/adjust
pub async fn adjust_timer_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, timer_id)): Path<(String, String)>,
    body: Option<Json<TimerControlRequest>>,
) -> ApiResult<Timer> {
    let request = control(body);
    ok(state
        .timers
        .adjust_timer(&room_id, &timer_id, request.adjustment)
        .await?)
}

/// Handle POST /api/v1/rooms/:room_id/messages
pub async fn create_message_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<CreateMessage>,
) -> Created<Message> {
    created(state.messages.create_message(&room_id, request).await?)
}

/// Handle PUT /api/v1/rooms/:room_id/messages/:message_id
pub async fn update_message_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, message_id)): Path<(String, String)>,
    Json(update): Json<UpdateMessage>,
) -> ApiResult<Message> {
    ok(state
        .messages
        .update_message(&room_id, &message_id, update)
        .await?)
}

/// Handle DELETE /api/v1/rooms/:room_id/messages/:message_id
pub async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, message_id)): Path<(String, String)>,
) -> ApiResult<String> {
    state.messages.delete_message(&room_id, &message_id).await?;
    ok(format!("Message {} deleted", message_id))
}

/// Handle POST /api/v1/rooms/:room_id/messages/:message_id/show
pub async fn show_message_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, message_id)): Path<(String, String)>,
) -> ApiResult<Message> {
    ok(state.messages.show_message(&room_id, &message_id).await?)
}

/// Handle POST /api/v1/rooms/:room_id/messages/:message_id/hide
pub async fn hide_message_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, message_id)): Path<(String, String)>,
) -> ApiResult<Message> {
    ok(state.messages.hide_message(&room_id, &message_id).await?)
}

/// Handle GET /health - Health check
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(
        state.get_uptime(),
        state.timers.scheduled_count(),
    ))
}
