//! Controller operations and event registration.

use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::{
        device::{DeviceControlResponse, TestHitRequest, TestHitResponse},
        settings::{ForceThresholdRequest, ForceThresholdResponse},
        station::{CreateEventRequest, EventResponse, JoinStationRequest, StationJoinedResponse},
    },
    error::AppError,
    services::{device_service, event_service},
    state::{SharedState, roster::Channel},
};

/// Routes touching the controller and the remote event registry.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/device/threshold", post(set_threshold))
        .route("/device/test-hit", post(test_hit))
        .route("/device/disconnect", post(disconnect_device))
        .route("/device/connect", post(connect_device))
        .route("/events", post(create_event))
        .route("/stations/join", post(join_station))
}

/// Store the hardware sensitivity and push it to the controller when one is connected.
#[utoipa::path(
    post,
    path = "/device/threshold",
    tag = "device",
    request_body = ForceThresholdRequest,
    responses(
        (status = 200, description = "Threshold stored", body = ForceThresholdResponse),
        (status = 503, description = "Controller write failed")
    )
)]
pub async fn set_threshold(
    State(state): State<SharedState>,
    Json(payload): Json<ForceThresholdRequest>,
) -> Result<Json<ForceThresholdResponse>, AppError> {
    let sent = device_service::set_force_threshold(&state, payload.threshold).await?;
    Ok(Json(ForceThresholdResponse {
        threshold: payload.threshold,
        sent,
    }))
}

/// Inject a simulated strike through the framer and detector.
#[utoipa::path(
    post,
    path = "/device/test-hit",
    tag = "device",
    request_body = TestHitRequest,
    responses(
        (status = 200, description = "Strike injected", body = TestHitResponse),
        (status = 400, description = "Channel out of range")
    )
)]
pub async fn test_hit(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TestHitRequest>>,
) -> Result<Json<TestHitResponse>, AppError> {
    let channel = payload.channel.and_then(Channel::new);
    let (channel, force, kicks) = device_service::test_hit(&state, channel, payload.force).await;
    Ok(Json(TestHitResponse {
        channel: channel.number(),
        force,
        accepted: !kicks.is_empty(),
    }))
}

/// Release the serial port until the operator reconnects.
#[utoipa::path(
    post,
    path = "/device/disconnect",
    tag = "device",
    responses((status = 200, description = "Controller released", body = DeviceControlResponse))
)]
pub async fn disconnect_device(State(state): State<SharedState>) -> Json<DeviceControlResponse> {
    device_service::disconnect(&state);
    Json(device_control(&state))
}

/// Reopen the serial port immediately.
#[utoipa::path(
    post,
    path = "/device/connect",
    tag = "device",
    responses((status = 200, description = "Reconnect requested", body = DeviceControlResponse))
)]
pub async fn connect_device(State(state): State<SharedState>) -> Json<DeviceControlResponse> {
    device_service::reconnect(&state);
    Json(device_control(&state))
}

fn device_control(state: &SharedState) -> DeviceControlResponse {
    DeviceControlResponse {
        enabled: state.device_enabled(),
        status: state.device_status(),
    }
}

/// Create an event and allocate its join code.
#[utoipa::path(
    post,
    path = "/events",
    tag = "event",
    request_body = CreateEventRequest,
    responses(
        (status = 200, description = "Event created", body = EventResponse),
        (status = 409, description = "No free join code found"),
        (status = 503, description = "Remote store offline")
    )
)]
pub async fn create_event(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateEventRequest>>,
) -> Result<Json<EventResponse>, AppError> {
    let event = event_service::create_event(&state, payload.title, payload.owner_id).await?;
    Ok(Json(event.into()))
}

/// Join this station to an event by its code.
#[utoipa::path(
    post,
    path = "/stations/join",
    tag = "event",
    request_body = JoinStationRequest,
    responses(
        (status = 200, description = "Station registered", body = StationJoinedResponse),
        (status = 404, description = "Unknown join code"),
        (status = 503, description = "Remote store offline")
    )
)]
pub async fn join_station(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinStationRequest>>,
) -> Result<Json<StationJoinedResponse>, AppError> {
    let joined = event_service::join_station(&state, &payload.code, payload.station_name).await?;
    Ok(Json(joined.into()))
}
