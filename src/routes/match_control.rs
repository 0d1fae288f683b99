//! Match lifecycle, group navigation and runtime settings.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        match_state::{MatchStateDto, StatusResponse},
        settings::{RenamePlayerRequest, SettingsUpdateRequest},
    },
    error::AppError,
    services::match_service::{self, SettingsChange},
    state::{SharedState, match_machine::GroupDirection, roster::Channel},
};

/// Operator routes driving the match lifecycle, groups and runtime settings.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/status", get(status))
        .route("/match/prepare", post(prepare))
        .route("/match/start", post(start))
        .route("/match/countdown-complete", post(countdown_complete))
        .route("/match/stop", post(stop))
        .route("/groups/next", post(next_group))
        .route("/groups/previous", post(previous_group))
        .route("/groups/{index}", post(select_group))
        .route("/settings", put(update_settings))
        .route("/players/{channel}", put(rename_player))
}

/// Current match, device, connectivity and queue status.
#[utoipa::path(
    get,
    path = "/status",
    tag = "match",
    responses((status = 200, description = "Station status", body = StatusResponse))
)]
pub async fn status(State(state): State<SharedState>) -> Result<Json<StatusResponse>, AppError> {
    let pending_deltas = state
        .queue()
        .pending_count()
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?;

    Ok(Json(StatusResponse {
        match_state: state.snapshot().await.into(),
        device: state.device_status(),
        online: state.queue().is_online(),
        pending_deltas,
        identity: state.identity().await,
    }))
}

/// Reset scores and arm the clock for the current group.
#[utoipa::path(
    post,
    path = "/match/prepare",
    tag = "match",
    responses((status = 200, description = "Match prepared", body = MatchStateDto))
)]
pub async fn prepare(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(match_service::prepare(&state).await.into())
}

/// Begin the countdown; a second request while counting down starts play immediately.
#[utoipa::path(
    post,
    path = "/match/start",
    tag = "match",
    responses((status = 200, description = "Start requested", body = MatchStateDto))
)]
pub async fn start(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(match_service::request_start(&state).await.into())
}

/// Signal that the countdown cue finished playing.
#[utoipa::path(
    post,
    path = "/match/countdown-complete",
    tag = "match",
    responses((status = 200, description = "Play started", body = MatchStateDto))
)]
pub async fn countdown_complete(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(match_service::countdown_finished(&state).await.into())
}

/// Stop the round early.
#[utoipa::path(
    post,
    path = "/match/stop",
    tag = "match",
    responses((status = 200, description = "Match stopped", body = MatchStateDto))
)]
pub async fn stop(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(match_service::stop(&state).await.into())
}

/// Step to the next group; no change on the last one.
#[utoipa::path(
    post,
    path = "/groups/next",
    tag = "groups",
    responses((status = 200, description = "Moved to the next group", body = MatchStateDto))
)]
pub async fn next_group(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(
        match_service::advance_group(&state, GroupDirection::Next)
            .await
            .into(),
    )
}

/// Step to the previous group; no change on the first one.
#[utoipa::path(
    post,
    path = "/groups/previous",
    tag = "groups",
    responses((status = 200, description = "Moved to the previous group", body = MatchStateDto))
)]
pub async fn previous_group(State(state): State<SharedState>) -> Json<MatchStateDto> {
    Json(
        match_service::advance_group(&state, GroupDirection::Previous)
            .await
            .into(),
    )
}

/// Jump directly to a group.
#[utoipa::path(
    post,
    path = "/groups/{index}",
    tag = "groups",
    params(("index" = usize, Path, description = "Zero-based group index")),
    responses(
        (status = 200, description = "Group selected", body = MatchStateDto),
        (status = 404, description = "No such group")
    )
)]
pub async fn select_group(
    State(state): State<SharedState>,
    Path(index): Path<usize>,
) -> Result<Json<MatchStateDto>, AppError> {
    let snapshot = match_service::select_group(&state, index).await?;
    Ok(Json(snapshot.into()))
}

/// Change timer, difficulty, debounce or auto-advance at runtime.
#[utoipa::path(
    put,
    path = "/settings",
    tag = "match",
    request_body = SettingsUpdateRequest,
    responses(
        (status = 200, description = "Settings applied", body = MatchStateDto),
        (status = 400, description = "Out of range value")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SettingsUpdateRequest>>,
) -> Json<MatchStateDto> {
    let change = SettingsChange {
        timer_duration_secs: payload.timer_duration_secs,
        difficulty: payload.difficulty,
        debounce: payload.debounce_ms.map(Duration::from_millis),
        auto_advance: payload.auto_advance,
    };
    Json(match_service::update_settings(&state, change).await.into())
}

/// Rename the player on a channel of the current group.
#[utoipa::path(
    put,
    path = "/players/{channel}",
    tag = "groups",
    params(("channel" = u8, Path, description = "Sensor channel, 1 to 4")),
    request_body = RenamePlayerRequest,
    responses(
        (status = 200, description = "Player renamed", body = MatchStateDto),
        (status = 400, description = "Invalid channel or name"),
        (status = 404, description = "No player on that channel")
    )
)]
pub async fn rename_player(
    State(state): State<SharedState>,
    Path(channel): Path<u8>,
    Valid(Json(payload)): Valid<Json<RenamePlayerRequest>>,
) -> Result<Json<MatchStateDto>, AppError> {
    let channel = Channel::try_from(channel).map_err(AppError::BadRequest)?;
    let snapshot = match_service::rename_player(&state, channel, payload.name).await?;
    Ok(Json(snapshot.into()))
}
