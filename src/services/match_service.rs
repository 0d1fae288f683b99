use std::time::Duration;

use tracing::{debug, error, info};

use crate::{
    device::detector::{DetectorSettings, KickEvent},
    error::ServiceError,
    services::clock,
    state::{
        SharedState, StationEvent,
        match_machine::{
            GroupDirection, MatchSnapshot, MatchStateMachine, MatchStatus, ScoredKick, Transition,
        },
        roster::Channel,
    },
    sync::record::ScoreDelta,
};

/// Runtime-adjustable match and detector parameters; `None` leaves a value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// New round length in seconds.
    pub timer_duration_secs: Option<u32>,
    /// New software difficulty.
    pub difficulty: Option<u16>,
    /// New debounce window.
    pub debounce: Option<Duration>,
    /// Enable or disable automatic group advance.
    pub auto_advance: Option<bool>,
}

/// Clear scores and arm the clock.
pub async fn prepare(state: &SharedState) -> MatchSnapshot {
    let snapshot = run(state, MatchStateMachine::prepare).await;
    info!(group = snapshot.current_group, "match prepared");
    snapshot
}

/// Start the countdown, or skip it when already counting down.
pub async fn request_start(state: &SharedState) -> MatchSnapshot {
    run(state, MatchStateMachine::request_start).await
}

/// Report that the countdown cue finished.
pub async fn countdown_finished(state: &SharedState) -> MatchSnapshot {
    run(state, MatchStateMachine::countdown_finished).await
}

/// End the round early.
pub async fn stop(state: &SharedState) -> MatchSnapshot {
    run(state, MatchStateMachine::stop).await
}

/// Step to the neighbouring group.
pub async fn advance_group(state: &SharedState, direction: GroupDirection) -> MatchSnapshot {
    run(state, |machine| machine.advance_group(direction)).await
}

/// Jump to a group by index.
pub async fn select_group(state: &SharedState, index: usize) -> Result<MatchSnapshot, ServiceError> {
    let group_count = state.snapshot().await.group_count;
    if index >= group_count {
        return Err(ServiceError::NotFound(format!(
            "group {index} (station has {group_count})"
        )));
    }
    Ok(run(state, |machine| machine.select_group(index)).await)
}

/// Rename the player on `channel` in the current group.
pub async fn rename_player(
    state: &SharedState,
    channel: Channel,
    name: String,
) -> Result<MatchSnapshot, ServiceError> {
    let snapshot = state.snapshot().await;
    if snapshot.players.get(channel.index()).is_none() {
        return Err(ServiceError::NotFound(format!("no player on channel {channel}")));
    }
    Ok(run(state, |machine| machine.rename_player(channel, name)).await)
}

/// Apply runtime settings to the match and the detector.
pub async fn update_settings(state: &SharedState, change: SettingsChange) -> MatchSnapshot {
    if change.difficulty.is_some() || change.debounce.is_some() {
        let mut detector = state.detector().lock().await;
        let current = detector.settings();
        detector.set_settings(DetectorSettings {
            difficulty: change.difficulty.unwrap_or(current.difficulty),
            debounce: change.debounce.unwrap_or(current.debounce),
        });
    }

    run(state, |machine| {
        let mut transition = Transition::default();
        if let Some(secs) = change.timer_duration_secs {
            transition.changed |= machine.set_duration(secs).changed;
        }
        if let Some(difficulty) = change.difficulty {
            transition.changed |= machine.set_difficulty(difficulty).changed;
        }
        if let Some(enabled) = change.auto_advance {
            transition.changed |= machine.set_auto_advance(enabled).changed;
        }
        transition
    })
    .await
}

/// Score a detected kick and hand the resulting delta to the durable queue.
///
/// The in-memory score and the queued delta move together: when the delta cannot be persisted
/// the increment is rolled back and the error returned. The match lock is not held while the
/// delta is written, so ticks and controls proceed during a slow enqueue.
pub async fn handle_kick(
    state: &SharedState,
    kick: KickEvent,
) -> Result<Option<ScoredKick>, ServiceError> {
    let identity = state.identity().await;
    let scored = state.machine().write().await.apply_kick(&kick);

    let Some(scored) = scored else {
        debug!(channel = %kick.channel, "kick ignored outside of play");
        state
            .events()
            .publish(StationEvent::Kick { kick, scored: None });
        return Ok(None);
    };

    match identity.event_id {
        Some(event_id) => {
            let delta = ScoreDelta::kick(event_id, scored.player_id);
            if let Err(err) = state.queue().enqueue(delta).await {
                state.machine().write().await.revoke_kick(&scored);
                error!(
                    error = %err,
                    player_id = scored.player_id,
                    "failed to persist score delta; kick discarded"
                );
                return Err(err.into());
            }
        }
        None => debug!(
            player_id = scored.player_id,
            "no event joined; score kept locally"
        ),
    }

    let snapshot = state.snapshot().await;
    debug!(
        channel = %kick.channel,
        force = kick.force,
        score = scored.score,
        "kick scored"
    );
    state.events().publish(StationEvent::Kick {
        kick,
        scored: Some(scored),
    });
    state.events().publish(StationEvent::Match(snapshot));
    Ok(Some(scored))
}

/// Advance the clock one step from the clock task. Returns whether the match still plays.
pub(crate) async fn tick(state: &SharedState) -> bool {
    let (transition, snapshot) = {
        let mut machine = state.machine().write().await;
        let transition = machine.tick();
        (transition, machine.snapshot())
    };
    let playing = snapshot.status == MatchStatus::Playing;
    if !playing && transition.changed {
        info!(group = snapshot.current_group, "match clock expired");
    }
    publish(state, transition, snapshot);
    playing
}

async fn run<F>(state: &SharedState, apply: F) -> MatchSnapshot
where
    F: FnOnce(&mut MatchStateMachine) -> Transition,
{
    let (transition, snapshot) = {
        let mut machine = state.machine().write().await;
        let transition = apply(&mut machine);
        (transition, machine.snapshot())
    };

    if !transition.changed {
        debug!(status = ?snapshot.status, "match command had no effect");
    }

    clock::sync(state).await;
    publish(state, transition, snapshot.clone());
    snapshot
}

fn publish(state: &SharedState, transition: Transition, snapshot: MatchSnapshot) {
    if !transition.changed {
        return;
    }
    for cue in transition.cues {
        state.events().publish(StationEvent::Cue(cue));
    }
    state.events().publish(StationEvent::Match(snapshot));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use tokio::{
        sync::Notify,
        time::{Instant, timeout},
    };

    use super::*;
    use crate::{
        config::StationConfig,
        state::AppState,
        sync::{
            local_store::{DeltaLog, DeltaLogError, DeltaLogResult, MemoryDeltaLog},
            queue::OfflineQueue,
            record::{DeltaKey, PendingDeltaRecord},
        },
    };

    /// Log whose appends either fail outright or wait for the test to release them.
    #[derive(Clone, Default)]
    struct StubbornLog {
        inner: MemoryDeltaLog,
        refuse: bool,
        gate: Option<Arc<Notify>>,
    }

    impl DeltaLog for StubbornLog {
        fn append(
            &self,
            delta: ScoreDelta,
        ) -> BoxFuture<'static, DeltaLogResult<PendingDeltaRecord>> {
            let log = self.clone();
            Box::pin(async move {
                if log.refuse {
                    return Err(DeltaLogError::KeyExhausted { attempts: 0 });
                }
                if let Some(gate) = &log.gate {
                    gate.notified().await;
                }
                log.inner.append(delta).await
            })
        }

        fn pending(&self) -> BoxFuture<'static, DeltaLogResult<Vec<PendingDeltaRecord>>> {
            self.inner.pending()
        }

        fn remove(&self, keys: Vec<DeltaKey>) -> BoxFuture<'static, DeltaLogResult<u64>> {
            self.inner.remove(keys)
        }

        fn count(&self) -> BoxFuture<'static, DeltaLogResult<u64>> {
            self.inner.count()
        }
    }

    async fn playing_station(log: StubbornLog) -> SharedState {
        let state = AppState::new(
            StationConfig {
                event_id: Some("EVT".into()),
                ..StationConfig::default()
            },
            OfflineQueue::new(Arc::new(log)),
        );
        prepare(&state).await;
        request_start(&state).await;
        countdown_finished(&state).await;
        state
    }

    fn kick(channel: u8) -> KickEvent {
        KickEvent {
            channel: Channel::new(channel).unwrap(),
            force: 500,
            observed_at: Instant::now(),
        }
    }

    fn scores(snapshot: &MatchSnapshot) -> Vec<u32> {
        snapshot.players.iter().map(|player| player.score).collect()
    }

    #[tokio::test]
    async fn unpersisted_kick_is_rolled_back() {
        let state = playing_station(StubbornLog {
            refuse: true,
            ..StubbornLog::default()
        })
        .await;
        let mut events = state.events().subscribe();

        let err = handle_kick(&state, kick(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Queue(_)));

        let snapshot = state.snapshot().await;
        assert_eq!(scores(&snapshot), vec![0, 0, 0, 0]);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, StationEvent::Kick { .. }));
        }
        stop(&state).await;
    }

    #[tokio::test]
    async fn slow_enqueue_does_not_block_the_match() {
        let gate = Arc::new(Notify::new());
        let log = StubbornLog {
            gate: Some(gate.clone()),
            ..StubbornLog::default()
        };
        let pending = log.inner.clone();
        let state = playing_station(log).await;

        let scoring = tokio::spawn({
            let state = state.clone();
            async move { handle_kick(&state, kick(2)).await }
        });

        let during = timeout(Duration::from_secs(1), async {
            loop {
                let snapshot = state.snapshot().await;
                if snapshot.players[1].score == 1 {
                    return snapshot;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("match state readable during enqueue");
        assert_eq!(scores(&during), vec![0, 1, 0, 0]);
        assert_eq!(pending.count().await.unwrap(), 0);

        let stopped = stop(&state).await;
        assert_eq!(stopped.status, MatchStatus::Stopped);

        gate.notify_one();
        let scored = scoring.await.unwrap().unwrap().expect("kick scored");
        assert_eq!(scored.score, 1);
        assert_eq!(pending.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn kicks_outside_play_are_not_queued() {
        let log = StubbornLog::default();
        let pending = log.inner.clone();
        let state = playing_station(log).await;
        stop(&state).await;

        assert_eq!(handle_kick(&state, kick(3)).await.unwrap(), None);
        assert_eq!(pending.count().await.unwrap(), 0);
    }
}
