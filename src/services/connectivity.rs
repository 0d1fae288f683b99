use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{remote_store::RemoteStore, storage::StorageError},
    state::{SharedState, StationEvent},
    sync::queue::FlushOutcome,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;
/// Period of the background retry flush.
pub const RETRY_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Connect the remote store and drive the queue's online flag from its health.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RemoteStore>, StorageError>> + Send,
{
    let queue = state.queue().clone();
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                queue.attach_remote(store.clone()).await;
                info!("remote store connected; score queue online");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if !queue.is_online() {
                                info!("remote store healthy again; score queue online");
                                queue.set_online(true);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "remote store health check failed; score queue offline");
                            queue.set_online(false);

                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;
                            for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(attempt, "remote store reconnected");
                                        reconnected = true;
                                        break;
                                    }
                                    Err(err) => {
                                        warn!(attempt, error = %err, "remote store reconnect attempt failed");
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                queue.set_online(true);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted remote reconnect attempts; reconnecting from scratch");
                            queue.detach_remote().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "remote store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Forward queue connectivity changes to station observers.
pub async fn publish_changes(state: SharedState) {
    let mut watcher = state.queue().online_watcher();
    loop {
        let online = *watcher.borrow_and_update();
        state.events().publish(StationEvent::Connectivity { online });
        if watcher.changed().await.is_err() {
            break;
        }
    }
}

/// Periodically retry flushing, covering remote failures that happen while online.
pub async fn retry_flushes(state: SharedState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match state.queue().flush().await {
            Ok(FlushOutcome::Applied {
                records,
                increments,
            }) => info!(records, increments, "retry flush applied pending deltas"),
            Ok(outcome) => debug!(?outcome, "retry flush"),
            Err(err) => warn!(error = %err, "retry flush failed; records stay pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StationConfig,
        dao::remote_store::memory::MemoryRemoteStore,
        state::AppState,
        sync::{local_store::MemoryDeltaLog, queue::OfflineQueue, record::ScoreDelta},
    };

    #[tokio::test(start_paused = true)]
    async fn outage_takes_queue_offline_and_recovery_flushes_backlog() {
        let remote = MemoryRemoteStore::new();
        let state = AppState::new(
            StationConfig::default(),
            OfflineQueue::new(Arc::new(MemoryDeltaLog::new())),
        );
        let queue = state.queue().clone();
        for _ in 0..2 {
            queue.enqueue(ScoreDelta::kick("E", 1)).await.unwrap();
        }

        let connect_to = remote.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = connect_to.clone();
            async move { Ok(Arc::new(store) as Arc<dyn RemoteStore>) }
        }));

        sleep(Duration::from_millis(100)).await;
        assert!(queue.is_online());
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert_eq!(remote.score("E", 1), Some(2));

        remote.set_reachable(false);
        queue.enqueue(ScoreDelta::kick("E", 1)).await.unwrap();

        // health poll at 5s fails; first reconnect attempt fails too
        sleep(Duration::from_millis(5_500)).await;
        assert!(!queue.is_online());
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        remote.set_reachable(true);
        sleep(Duration::from_millis(1_000)).await;
        assert!(queue.is_online());
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert_eq!(remote.score("E", 1), Some(3));

        supervisor.abort();
    }

    #[tokio::test]
    async fn connectivity_changes_reach_station_observers() {
        let state = AppState::new(
            StationConfig::default(),
            OfflineQueue::new(Arc::new(MemoryDeltaLog::new())),
        );
        let mut events = state.events().subscribe();
        let forwarder = tokio::spawn(publish_changes(state.clone()));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, StationEvent::Connectivity { online: false }));

        state
            .queue()
            .attach_remote(Arc::new(MemoryRemoteStore::new()))
            .await;
        let next = events.recv().await.unwrap();
        assert!(matches!(next, StationEvent::Connectivity { online: true }));

        forwarder.abort();
    }
}
