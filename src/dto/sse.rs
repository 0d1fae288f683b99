//! Server-sent event payloads.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    device::DeviceStatus,
    dto::match_state::MatchStateDto,
    state::{match_machine::MatchCue, roster::Channel},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed messages use the default `message` event.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial snapshot sent to an SSE client when it connects.
pub struct Handshake {
    /// Current match state.
    pub match_state: MatchStateDto,
    /// Controller connection.
    pub device: DeviceStatus,
    /// Whether the remote store is reachable.
    pub online: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast for every accepted kick.
pub struct KickNotice {
    /// Channel the kick landed on.
    #[schema(value_type = u8)]
    pub channel: Channel,
    /// Measured force.
    pub force: u16,
    /// Whether the kick counted towards the score.
    pub scored: bool,
    /// Player score after the kick, when it counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast when a transition requests a cue.
pub struct CueEvent(pub MatchCue);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the remote store becomes reachable or unreachable.
pub struct ConnectivityEvent {
    /// Whether flushes are allowed.
    pub online: bool,
}
