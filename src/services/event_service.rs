//! Event creation and station registration against the remote store.

use std::{sync::Arc, time::SystemTime};

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{EventEntity, EventSettings, EventStatus, StationEntity},
        remote_store::RemoteStore,
    },
    error::ServiceError,
    services::match_service::{self, SettingsChange},
    state::{SharedState, StationIdentity},
};

/// Characters used in join codes; visually ambiguous ones (0, 1, I, O) are left out.
pub const JOIN_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
/// Length of a join code.
pub const JOIN_CODE_LEN: usize = 4;
/// How many codes are tried before giving up.
pub const MAX_JOIN_CODE_ATTEMPTS: u32 = 16;

/// Outcome of joining an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationJoined {
    /// The joined event.
    pub event: EventEntity,
    /// Identifier assigned to this station.
    pub station_id: String,
}

/// Draw a random join code.
pub fn generate_join_code<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Create an event with a fresh, unused join code.
pub async fn create_event(
    state: &SharedState,
    title: String,
    owner_id: String,
) -> Result<EventEntity, ServiceError> {
    let store = require_remote(state).await?;
    create_event_with(store.as_ref(), title, owner_id, || {
        generate_join_code(&mut rand::rng())
    })
    .await
}

/// Create an event drawing candidate codes from `next_code` until one is unused.
pub async fn create_event_with<F>(
    store: &dyn RemoteStore,
    title: String,
    owner_id: String,
    mut next_code: F,
) -> Result<EventEntity, ServiceError>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_JOIN_CODE_ATTEMPTS {
        let code = next_code();
        if store.find_event_by_code(code.clone()).await?.is_some() {
            debug!(attempt, %code, "join code already taken");
            continue;
        }

        let event = EventEntity {
            id: Uuid::new_v4().simple().to_string(),
            title,
            code,
            owner_id,
            status: EventStatus::Scheduled,
            settings: EventSettings::default(),
            created_at: SystemTime::now(),
        };
        store.create_event(event.clone()).await?;
        info!(event_id = %event.id, code = %event.code, "event created");
        return Ok(event);
    }

    Err(ServiceError::Exhausted {
        what: "unique join code",
        attempts: MAX_JOIN_CODE_ATTEMPTS,
    })
}

/// Look the event up by join code, register this station and score for that event from now on.
pub async fn join_station(
    state: &SharedState,
    code: &str,
    station_name: String,
) -> Result<StationJoined, ServiceError> {
    let store = require_remote(state).await?;
    let code = code.trim().to_ascii_uppercase();

    let event = store
        .find_event_by_code(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event with code `{code}`")))?;

    let station = StationEntity {
        id: Uuid::new_v4().simple().to_string(),
        event_id: event.id.clone(),
        name: station_name,
        registered_at: SystemTime::now(),
    };
    store.register_station(station.clone()).await?;

    state
        .set_identity(StationIdentity {
            event_id: Some(event.id.clone()),
            station_id: Some(station.id.clone()),
        })
        .await;
    match_service::update_settings(
        state,
        SettingsChange {
            timer_duration_secs: Some(event.settings.timer_duration_secs),
            difficulty: Some(event.settings.difficulty),
            ..SettingsChange::default()
        },
    )
    .await;

    info!(event_id = %event.id, station_id = %station.id, "station joined event");
    Ok(StationJoined {
        event,
        station_id: station.id,
    })
}

async fn require_remote(state: &SharedState) -> Result<Arc<dyn RemoteStore>, ServiceError> {
    state.queue().remote().await.ok_or(ServiceError::Offline)
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::{
        config::StationConfig,
        dao::remote_store::memory::MemoryRemoteStore,
        state::{AppState, match_machine::MatchClock},
        sync::{local_store::MemoryDeltaLog, queue::OfflineQueue},
    };

    async fn station_with(remote: &MemoryRemoteStore) -> SharedState {
        let state = AppState::new(
            StationConfig::default(),
            OfflineQueue::new(Arc::new(MemoryDeltaLog::new())),
        );
        state.queue().attach_remote(Arc::new(remote.clone())).await;
        state
    }

    fn existing(code: &str) -> EventEntity {
        EventEntity {
            id: format!("evt-{code}"),
            title: "existing".into(),
            code: code.into(),
            owner_id: "owner".into(),
            status: EventStatus::Active,
            settings: EventSettings::default(),
            created_at: UNIX_EPOCH,
        }
    }

    #[test]
    fn codes_use_the_restricted_alphabet() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let code = generate_join_code(&mut rng);
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn collisions_are_retried_transparently() {
        let store = MemoryRemoteStore::new();
        store.insert_event(existing("AAAA"));
        let mut candidates = vec!["BBBB", "AAAA", "AAAA"];

        let event = create_event_with(&store, "Finals".into(), "ops".into(), || {
            candidates.pop().unwrap().to_string()
        })
        .await
        .unwrap();

        assert_eq!(event.code, "BBBB");
        assert_eq!(event.settings, EventSettings::default());
        assert_eq!(event.status, EventStatus::Scheduled);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let store = MemoryRemoteStore::new();
        store.insert_event(existing("AAAA"));

        let err = create_event_with(&store, "Finals".into(), "ops".into(), || "AAAA".into())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Exhausted {
                attempts: MAX_JOIN_CODE_ATTEMPTS,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn joining_registers_station_and_adopts_event_settings() {
        let remote = MemoryRemoteStore::new();
        remote.insert_event(EventEntity {
            settings: EventSettings {
                timer_duration_secs: 45,
                difficulty: 17,
            },
            ..existing("K7QZ")
        });
        let state = station_with(&remote).await;

        let joined = join_station(&state, " k7qz ", "Station B".into())
            .await
            .unwrap();

        assert_eq!(joined.event.id, "evt-K7QZ");
        let stations = remote.stations();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, joined.station_id);
        assert_eq!(stations[0].event_id, "evt-K7QZ");
        assert_eq!(stations[0].name, "Station B");

        let identity = state.identity().await;
        assert_eq!(identity.event_id.as_deref(), Some("evt-K7QZ"));
        assert_eq!(identity.station_id, Some(joined.station_id));

        assert_eq!(state.detector().lock().await.settings().difficulty, 17);
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.difficulty, 17);
        assert_eq!(snapshot.duration_secs, 45);
        assert_eq!(snapshot.clock, MatchClock::full(45));
    }

    #[tokio::test]
    async fn unknown_code_leaves_identity_untouched() {
        let remote = MemoryRemoteStore::new();
        let state = station_with(&remote).await;

        let err = join_station(&state, "ZZZZ", "Station A".into())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(remote.stations().is_empty());
        assert_eq!(state.identity().await, StationIdentity::default());
    }
}
