//! End-to-end flow: raw controller bytes in, remote leaderboard totals out.

use std::{sync::Arc, time::Duration};

use kicklab_station::{
    config::StationConfig,
    dao::remote_store::memory::MemoryRemoteStore,
    device::{framer::PacketFramer, packet::Packet},
    services::{device_service, match_service},
    state::{
        AppState, SharedState, StationEvent,
        match_machine::{MatchClock, MatchCue, MatchStatus},
    },
    sync::{local_store::SqliteDeltaLog, queue::OfflineQueue},
};
use tokio::time::{sleep, timeout};

const EVENT_ID: &str = "evt-pipeline";

async fn station(config: StationConfig) -> SharedState {
    let log = SqliteDeltaLog::connect("sqlite::memory:")
        .await
        .expect("in-memory delta log");
    AppState::new(config, OfflineQueue::new(Arc::new(log)))
}

fn sensor_bytes(forces: [u16; 4], flags: u8) -> Vec<u8> {
    Packet::encode(forces, flags).as_bytes().to_vec()
}

async fn wait_until_drained(state: &SharedState) {
    timeout(Duration::from_secs(5), async {
        loop {
            if state.queue().pending_count().await.unwrap() == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue drained");
}

#[tokio::test]
async fn kicks_reach_the_remote_leaderboard_after_reconnect() {
    let config = StationConfig {
        event_id: Some(EVENT_ID.into()),
        timer_duration_secs: 600,
        groups: vec![vec!["Ana".into(), "Bo".into(), "Cy".into(), "Di".into()]],
        player_id_offset: 4,
        ..StationConfig::default()
    };
    let state = station(config).await;

    match_service::prepare(&state).await;
    match_service::request_start(&state).await;
    let snapshot = match_service::countdown_finished(&state).await;
    assert_eq!(snapshot.status, MatchStatus::Playing);

    let mut framer = PacketFramer::new();

    // line noise and a split packet in front of the first real kick
    let mut first = vec![0x00, 0xAA, 0x13, 0xBB];
    first.extend(sensor_bytes([350, 0, 0, 0], 0b0001));
    let (head, tail) = first.split_at(12);
    assert!(
        device_service::process_bytes(&state, &mut framer, head)
            .await
            .is_empty()
    );
    let kicks = device_service::process_bytes(&state, &mut framer, tail).await;
    assert_eq!(kicks.len(), 1);

    // below threshold on channel 2, accepted on channel 3
    device_service::process_bytes(&state, &mut framer, &sensor_bytes([0, 150, 900, 0], 0b0110))
        .await;

    sleep(Duration::from_millis(120)).await;
    device_service::process_bytes(&state, &mut framer, &sensor_bytes([400, 0, 0, 0], 0b0001))
        .await;

    let scores: Vec<u32> = state
        .snapshot()
        .await
        .players
        .iter()
        .map(|player| player.score)
        .collect();
    assert_eq!(scores, vec![2, 0, 1, 0]);
    assert_eq!(state.queue().pending_count().await.unwrap(), 3);

    let remote = MemoryRemoteStore::new();
    state.queue().attach_remote(Arc::new(remote.clone())).await;
    wait_until_drained(&state).await;

    assert_eq!(remote.score(EVENT_ID, 5), Some(2));
    assert_eq!(remote.score(EVENT_ID, 7), Some(1));
    assert_eq!(remote.score(EVENT_ID, 6), None);
    assert_eq!(remote.increment_calls(), 2);

    match_service::stop(&state).await;
}

#[tokio::test]
async fn kicks_outside_play_are_reported_but_not_queued() {
    let state = station(StationConfig {
        event_id: Some(EVENT_ID.into()),
        ..StationConfig::default()
    })
    .await;
    let mut events = state.events().subscribe();
    let mut framer = PacketFramer::new();

    let kicks =
        device_service::process_bytes(&state, &mut framer, &sensor_bytes([0, 0, 0, 999], 0b1000))
            .await;

    assert_eq!(kicks.len(), 1);
    assert_eq!(state.queue().pending_count().await.unwrap(), 0);
    match events.recv().await.unwrap() {
        StationEvent::Kick { kick, scored } => {
            assert_eq!(kick.channel.number(), 4);
            assert!(scored.is_none());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn clock_expiry_stops_the_round_and_advances_the_group() {
    let state = station(StationConfig {
        timer_duration_secs: 1,
        auto_advance: true,
        groups: vec![
            vec!["Ana".into(), "Bo".into()],
            vec!["Cy".into(), "Di".into()],
        ],
        ..StationConfig::default()
    })
    .await;
    let mut events = state.events().subscribe();

    match_service::prepare(&state).await;
    match_service::request_start(&state).await;
    match_service::countdown_finished(&state).await;

    timeout(Duration::from_secs(3), async {
        loop {
            if let Ok(StationEvent::Cue(MatchCue::TimerExpired)) = events.recv().await {
                break;
            }
        }
    })
    .await
    .expect("timer expired");

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.status, MatchStatus::Stopped);
    assert_eq!(snapshot.clock, MatchClock::full(1));
    assert_eq!(snapshot.current_group, 1);
    assert_eq!(snapshot.players[0].name, "Cy");
}
