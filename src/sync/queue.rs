//! Offline-tolerant queue forwarding score deltas to the remote store.
//!
//! Deltas are appended to the local log first; a flush later aggregates every pending record per
//! `(event, player)`, issues one increment per aggregate and deletes the source records only once
//! all increments were acknowledged.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use super::{
    local_store::{DeltaLog, DeltaLogError},
    record::{DeltaKey, PendingDeltaRecord, ScoreDelta, aggregate},
};
use crate::dao::{remote_store::RemoteStore, storage::StorageError};

/// Failures surfaced by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The local durable log failed; the operation had no effect.
    #[error("local delta log failure")]
    Local(#[from] DeltaLogError),
    /// An increment was rejected; every pending record was kept.
    #[error("remote increment failed for player {player_id} in event `{event_id}`")]
    Remote {
        /// Event of the failed aggregate.
        event_id: String,
        /// Player whose score was being raised.
        player_id: u32,
        /// Remote store error.
        #[source]
        source: StorageError,
    },
}

/// What a call to [`OfflineQueue::flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush was in progress; it will pick up the new records.
    AlreadyRunning,
    /// No remote store is reachable; nothing was attempted.
    Offline,
    /// There was nothing pending.
    Empty,
    /// Pending records were applied remotely and deleted.
    Applied {
        /// Number of local records deleted.
        records: u64,
        /// Number of increment calls issued.
        increments: usize,
    },
}

/// Durable score queue with single-flight flushing.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    log: Arc<dyn DeltaLog>,
    remote: RwLock<Option<Arc<dyn RemoteStore>>>,
    online: watch::Sender<bool>,
    flushing: AtomicBool,
    rerun: AtomicBool,
}

impl OfflineQueue {
    /// Create an offline queue over `log`.
    pub fn new(log: Arc<dyn DeltaLog>) -> Self {
        let (online, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(QueueInner {
                log,
                remote: RwLock::new(None),
                online,
                flushing: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
            }),
        }
    }

    /// Install the remote store and go online, flushing anything pending.
    pub async fn attach_remote(&self, store: Arc<dyn RemoteStore>) {
        {
            let mut guard = self.inner.remote.write().await;
            *guard = Some(store);
        }
        self.set_online(true);
    }

    /// Drop the remote store and go offline.
    pub async fn detach_remote(&self) {
        self.set_online(false);
        let mut guard = self.inner.remote.write().await;
        guard.take();
    }

    /// Current remote store, if one is attached.
    pub async fn remote(&self) -> Option<Arc<dyn RemoteStore>> {
        let guard = self.inner.remote.read().await;
        guard.as_ref().cloned()
    }

    /// Apply a connectivity signal. Going online schedules a flush.
    pub fn set_online(&self, online: bool) {
        let changed = self.inner.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });

        if changed {
            info!(online, "score queue connectivity changed");
        }
        if changed && online {
            self.spawn_flush();
        }
    }

    /// Whether flushes are currently allowed.
    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    /// Subscribe to connectivity changes.
    pub fn online_watcher(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    /// Persist `delta`; once durable, schedule a flush when online.
    ///
    /// Never blocks on the network.
    pub async fn enqueue(&self, delta: ScoreDelta) -> Result<PendingDeltaRecord, QueueError> {
        let record = self.inner.log.append(delta).await?;
        if self.is_online() {
            self.spawn_flush();
        }
        Ok(record)
    }

    /// Number of records waiting for remote acknowledgement.
    pub async fn pending_count(&self) -> Result<u64, QueueError> {
        Ok(self.inner.log.count().await?)
    }

    /// Fire-and-forget flush; failures are logged and retried on the next trigger.
    pub fn spawn_flush(&self) {
        let queue = self.clone();
        tokio::spawn(async move {
            match queue.flush().await {
                Ok(outcome) => debug!(?outcome, "background flush finished"),
                Err(err) => warn!(error = %err, "background flush failed; records stay pending"),
            }
        });
    }

    /// Push every pending record to the remote store.
    ///
    /// At most one flush runs at a time. A request arriving while one runs marks it for another
    /// pass and returns [`FlushOutcome::AlreadyRunning`].
    pub async fn flush(&self) -> Result<FlushOutcome, QueueError> {
        if !self.is_online() {
            return Ok(FlushOutcome::Offline);
        }

        let mut last = FlushOutcome::Empty;
        let mut applied: Option<(u64, usize)> = None;

        loop {
            if !self.try_claim() {
                return Ok(FlushOutcome::AlreadyRunning);
            }

            let pass = {
                let _guard = FlushGuard(&self.inner.flushing);
                self.inner.rerun.store(false, Ordering::SeqCst);
                self.flush_pass().await
            };

            match pass? {
                FlushOutcome::Applied {
                    records,
                    increments,
                } => {
                    let (r, i) = applied.get_or_insert((0, 0));
                    *r += records;
                    *i += increments;
                }
                other => last = other,
            }

            if !self.inner.rerun.swap(false, Ordering::SeqCst) || !self.is_online() {
                break;
            }
        }

        Ok(match applied {
            Some((records, increments)) => FlushOutcome::Applied {
                records,
                increments,
            },
            None => last,
        })
    }

    fn try_claim(&self) -> bool {
        loop {
            if self
                .inner
                .flushing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
            self.inner.rerun.store(true, Ordering::SeqCst);
            if self.inner.flushing.load(Ordering::SeqCst) {
                return false;
            }
        }
    }

    async fn flush_pass(&self) -> Result<FlushOutcome, QueueError> {
        let Some(remote) = self.remote().await else {
            return Ok(FlushOutcome::Offline);
        };

        let records = self.inner.log.pending().await?;
        if records.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let aggregates = aggregate(&records);
        let mut applied_keys: Vec<DeltaKey> = Vec::with_capacity(records.len());
        let mut increments = 0;

        for total in aggregates {
            if total.points != 0 {
                remote
                    .increment_player_score(total.event_id.clone(), total.player_id, total.points)
                    .await
                    .map_err(|source| QueueError::Remote {
                        event_id: total.event_id.clone(),
                        player_id: total.player_id,
                        source,
                    })?;
                increments += 1;
            }
            applied_keys.extend(total.keys);
        }

        let removed = self.inner.log.remove(applied_keys).await?;
        info!(records = removed, increments, "flushed pending score deltas");
        Ok(FlushOutcome::Applied {
            records: removed,
            increments,
        })
    }
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
