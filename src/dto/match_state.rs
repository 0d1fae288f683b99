//! Match snapshot as served to the kiosk UI.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    device::{DeviceStatus, detector::DIFFICULTY_SCALE},
    state::{
        StationIdentity,
        match_machine::{MatchClock, MatchSnapshot, MatchStatus},
    },
};

/// Public view of one player slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerDto {
    /// Sensor channel (1-4).
    pub channel: u8,
    /// Remote player id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Kicks scored in the current round.
    pub score: u32,
}

/// Match state as shown to the presentation layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchStateDto {
    /// Lifecycle phase.
    pub status: MatchStatus,
    /// Time left on the clock.
    pub remaining: MatchClock,
    /// Configured round length in seconds.
    pub duration_secs: u32,
    /// Software difficulty.
    pub difficulty: u16,
    /// Force a kick must exceed to count (`difficulty * 20`).
    pub threshold: u32,
    /// Hardware sensitivity last sent to the controller.
    pub force_threshold: u8,
    /// Players of the current group, ordered by channel.
    pub players: Vec<PlayerDto>,
    /// Index of the active group.
    pub current_group: usize,
    /// Number of configured groups.
    pub group_count: usize,
    /// Whether expiry moves on to the next group.
    pub auto_advance: bool,
    /// Incremented on every change; lets clients drop stale updates.
    pub version: u64,
}

impl From<MatchSnapshot> for MatchStateDto {
    fn from(snapshot: MatchSnapshot) -> Self {
        let players = snapshot
            .players
            .into_iter()
            .enumerate()
            .map(|(index, player)| PlayerDto {
                channel: index as u8 + 1,
                id: player.id,
                name: player.name,
                score: player.score,
            })
            .collect();

        Self {
            status: snapshot.status,
            remaining: snapshot.clock,
            duration_secs: snapshot.duration_secs,
            difficulty: snapshot.difficulty,
            threshold: u32::from(snapshot.difficulty) * DIFFICULTY_SCALE,
            force_threshold: snapshot.force_threshold,
            players,
            current_group: snapshot.current_group,
            group_count: snapshot.group_count,
            auto_advance: snapshot.auto_advance,
            version: snapshot.version,
        }
    }
}

/// Everything an operator screen needs in one call.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Current match state.
    pub match_state: MatchStateDto,
    /// Controller link status.
    pub device: DeviceStatus,
    /// Whether the remote store is reachable.
    pub online: bool,
    /// Score deltas not yet acknowledged by the remote store.
    pub pending_deltas: u64,
    /// Event and station this kiosk reports for.
    pub identity: StationIdentity,
}
