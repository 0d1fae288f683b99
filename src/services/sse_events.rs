use tracing::warn;

use crate::{
    dto::{
        match_state::MatchStateDto,
        sse::{ConnectivityEvent, CueEvent, KickNotice, ServerEvent},
    },
    state::StationEvent,
};

const EVENT_MATCH: &str = "match";
const EVENT_CUE: &str = "cue";
const EVENT_KICK: &str = "kick";
const EVENT_DEVICE: &str = "device";
const EVENT_CONNECTIVITY: &str = "connectivity";
pub(crate) const EVENT_HANDSHAKE: &str = "handshake";

/// Render a station event as a named SSE payload.
///
/// Returns `None` when serialisation fails; the failure is logged and the event dropped.
pub fn to_server_event(event: StationEvent) -> Option<ServerEvent> {
    let result = match event {
        StationEvent::Match(snapshot) => {
            ServerEvent::json(EVENT_MATCH.to_string(), &MatchStateDto::from(snapshot))
        }
        StationEvent::Cue(cue) => ServerEvent::json(EVENT_CUE.to_string(), &CueEvent(cue)),
        StationEvent::Kick { kick, scored } => ServerEvent::json(
            EVENT_KICK.to_string(),
            &KickNotice {
                channel: kick.channel,
                force: kick.force,
                scored: scored.is_some(),
                score: scored.map(|scored| scored.score),
            },
        ),
        StationEvent::Device(status) => ServerEvent::json(EVENT_DEVICE.to_string(), &status),
        StationEvent::Connectivity { online } => {
            ServerEvent::json(EVENT_CONNECTIVITY.to_string(), &ConnectivityEvent { online })
        }
    };

    match result {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialise station event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::{
        device::{DeviceStatus, detector::KickEvent},
        state::{match_machine::ScoredKick, roster::Channel},
    };

    #[test]
    fn kick_notice_carries_score_only_when_counted() {
        let kick = KickEvent {
            channel: Channel::ALL[2],
            force: 640,
            observed_at: Instant::now(),
        };

        let ignored = to_server_event(StationEvent::Kick { kick, scored: None }).unwrap();
        assert_eq!(ignored.event.as_deref(), Some("kick"));
        assert_eq!(ignored.data, r#"{"channel":3,"force":640,"scored":false}"#);

        let scored = to_server_event(StationEvent::Kick {
            kick,
            scored: Some(ScoredKick {
                channel: kick.channel,
                player_id: 3,
                score: 7,
            }),
        })
        .unwrap();
        assert_eq!(
            scored.data,
            r#"{"channel":3,"force":640,"scored":true,"score":7}"#
        );
    }

    #[test]
    fn device_failure_reason_is_exposed() {
        let event =
            to_server_event(StationEvent::Device(DeviceStatus::Failed("no such port".into())))
                .unwrap();

        assert_eq!(event.event.as_deref(), Some("device"));
        assert_eq!(event.data, r#"{"state":"failed","reason":"no such port"}"#);
    }
}
