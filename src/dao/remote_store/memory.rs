//! In-process [`RemoteStore`] used when no cloud backend is configured, and by tests.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::RemoteStore;
use crate::dao::{
    models::{EventEntity, StationEntity},
    storage::{StorageError, StorageResult},
};

/// Remote store kept entirely in memory, with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    events: DashMap<String, EventEntity>,
    stations: DashMap<String, StationEntity>,
    scores: DashMap<(String, u32), i64>,
    offline: AtomicBool,
    increments_before_failure: Mutex<Option<usize>>,
    increment_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Empty, reachable store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail (`false`) or succeed again (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.offline.store(!reachable, Ordering::SeqCst);
    }

    /// Let the next `count` increments succeed, then fail the following ones until reset.
    pub fn fail_increments_after(&self, count: Option<usize>) {
        if let Ok(mut guard) = self.inner.increments_before_failure.lock() {
            *guard = count;
        }
    }

    /// Current score of a player, if any increment reached it.
    pub fn score(&self, event_id: &str, player_id: u32) -> Option<i64> {
        self.inner
            .scores
            .get(&(event_id.to_owned(), player_id))
            .map(|entry| *entry)
    }

    /// Number of successful increment calls so far.
    pub fn increment_calls(&self) -> usize {
        self.inner.increment_calls.load(Ordering::SeqCst)
    }

    /// Registered stations.
    pub fn stations(&self) -> Vec<StationEntity> {
        self.inner
            .stations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Insert an event directly, bypassing code generation.
    pub fn insert_event(&self, event: EventEntity) {
        self.inner.events.insert(event.id.clone(), event);
    }

    fn check_reachable(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(unreachable_error())
        } else {
            Ok(())
        }
    }

    fn take_increment_permit(&self) -> StorageResult<()> {
        let Ok(mut guard) = self.inner.increments_before_failure.lock() else {
            return Err(unreachable_error());
        };
        match guard.as_mut() {
            Some(0) => Err(unreachable_error()),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn unreachable_error() -> StorageError {
    StorageError::unavailable(
        "memory store unreachable".into(),
        io::Error::new(io::ErrorKind::NotConnected, "simulated outage"),
    )
}

impl RemoteStore for MemoryRemoteStore {
    fn find_event_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_reachable()?;
            Ok(store
                .inner
                .events
                .iter()
                .find(|entry| entry.code == code)
                .map(|entry| entry.value().clone()))
        })
    }

    fn create_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_reachable()?;
            store.inner.events.insert(event.id.clone(), event);
            Ok(())
        })
    }

    fn register_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_reachable()?;
            store.inner.stations.insert(station.id.clone(), station);
            Ok(())
        })
    }

    fn increment_player_score(
        &self,
        event_id: String,
        player_id: u32,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_reachable()?;
            store.take_increment_permit()?;
            *store.inner.scores.entry((event_id, player_id)).or_insert(0) += delta;
            store.inner.increment_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_reachable() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_reachable() })
    }
}
