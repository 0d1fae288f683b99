//! Event creation and station registration payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{EventEntity, EventSettings, EventStatus},
    dto::format_system_time,
    services::event_service::StationJoined,
};

/// Payload creating a new event.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateEventRequest {
    /// Display title.
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    /// Account that owns the event.
    #[validate(length(min = 1))]
    pub owner_id: String,
}

/// Public view of an event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    /// Event identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Join code typed at the stations.
    pub code: String,
    /// Whether the event accepts scores.
    pub status: EventStatus,
    /// Match settings adopted by joining stations.
    pub settings: EventSettings,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<EventEntity> for EventResponse {
    fn from(event: EventEntity) -> Self {
        Self {
            id: event.id,
            title: event.title,
            code: event.code,
            status: event.status,
            settings: event.settings,
            created_at: format_system_time(event.created_at),
        }
    }
}

/// Payload joining this station to an event.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinStationRequest {
    /// Four-character join code; case and surrounding spaces are ignored.
    #[validate(length(equal = 4))]
    pub code: String,
    /// Name shown for this kiosk on the leaderboard.
    #[validate(length(min = 1, max = 60))]
    pub station_name: String,
}

/// Identity adopted after joining.
#[derive(Debug, Serialize, ToSchema)]
pub struct StationJoinedResponse {
    /// Event the station joined.
    pub event: EventResponse,
    /// Identifier assigned to this station.
    pub station_id: String,
}

impl From<StationJoined> for StationJoinedResponse {
    fn from(joined: StationJoined) -> Self {
        Self {
            event: joined.event.into(),
            station_id: joined.station_id,
        }
    }
}
