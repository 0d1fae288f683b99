use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the kick station.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::station_stream,
        crate::routes::match_control::status,
        crate::routes::match_control::prepare,
        crate::routes::match_control::start,
        crate::routes::match_control::countdown_complete,
        crate::routes::match_control::stop,
        crate::routes::match_control::next_group,
        crate::routes::match_control::previous_group,
        crate::routes::match_control::select_group,
        crate::routes::match_control::update_settings,
        crate::routes::match_control::rename_player,
        crate::routes::station::set_threshold,
        crate::routes::station::test_hit,
        crate::routes::station::disconnect_device,
        crate::routes::station::connect_device,
        crate::routes::station::create_event,
        crate::routes::station::join_station,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::match_state::MatchStateDto,
            crate::dto::match_state::PlayerDto,
            crate::dto::match_state::StatusResponse,
            crate::dto::settings::SettingsUpdateRequest,
            crate::dto::settings::RenamePlayerRequest,
            crate::dto::settings::ForceThresholdRequest,
            crate::dto::settings::ForceThresholdResponse,
            crate::dto::device::TestHitRequest,
            crate::dto::device::TestHitResponse,
            crate::dto::device::DeviceControlResponse,
            crate::dto::station::CreateEventRequest,
            crate::dto::station::EventResponse,
            crate::dto::station::JoinStationRequest,
            crate::dto::station::StationJoinedResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::KickNotice,
            crate::dto::sse::CueEvent,
            crate::dto::sse::ConnectivityEvent,
            crate::device::DeviceStatus,
            crate::state::StationIdentity,
            crate::state::match_machine::MatchStatus,
            crate::state::match_machine::MatchClock,
            crate::state::match_machine::MatchCue,
            crate::dao::models::EventStatus,
            crate::dao::models::EventSettings,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "match", description = "Match lifecycle and runtime settings"),
        (name = "groups", description = "Group navigation and roster edits"),
        (name = "device", description = "Kick-pad controller"),
        (name = "event", description = "Remote events and station registration"),
    )
)]
pub struct ApiDoc;
