//! Local durable storage for pending score deltas.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use futures::future::BoxFuture;
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::{DeltaKey, PendingDeltaRecord, ScoreDelta};

const MAX_KEY_ATTEMPTS: u32 = 8;

/// Result alias for delta log operations.
pub type DeltaLogResult<T> = Result<T, DeltaLogError>;

/// Failures of the local delta log.
#[derive(Debug, Error)]
pub enum DeltaLogError {
    /// The database could not be opened or prepared.
    #[error("failed to open delta log `{url}`")]
    Open {
        /// URL the log was opened with.
        url: String,
        /// Database error.
        #[source]
        source: sqlx::Error,
    },
    /// A query against the log failed.
    #[error("delta log query failed: {operation}")]
    Query {
        /// Operation that failed.
        operation: &'static str,
        /// Database error.
        #[source]
        source: sqlx::Error,
    },
    /// Every generated key collided with an existing record.
    #[error("could not allocate a unique delta key after {attempts} attempts")]
    KeyExhausted {
        /// Number of keys generated.
        attempts: u32,
    },
    /// A stored row does not describe a valid record.
    #[error("corrupt delta record `{key}`")]
    Corrupt {
        /// Key of the offending row.
        key: String,
    },
}

/// Durable, keyed store of [`PendingDeltaRecord`]s.
pub trait DeltaLog: Send + Sync {
    /// Persist `delta` under a fresh key; resolves once the write is durable.
    fn append(&self, delta: ScoreDelta) -> BoxFuture<'static, DeltaLogResult<PendingDeltaRecord>>;
    /// Every pending record, oldest first.
    fn pending(&self) -> BoxFuture<'static, DeltaLogResult<Vec<PendingDeltaRecord>>>;
    /// Delete exactly the given records, returning how many were removed.
    fn remove(&self, keys: Vec<DeltaKey>) -> BoxFuture<'static, DeltaLogResult<u64>>;
    /// Number of pending records.
    fn count(&self) -> BoxFuture<'static, DeltaLogResult<u64>>;
}

/// [`DeltaLog`] backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteDeltaLog {
    pool: Pool<Sqlite>,
}

impl SqliteDeltaLog {
    /// Open (or create) the database at `url` and ensure the table exists.
    ///
    /// `sqlite::memory:` is accepted for tests; the pool is then pinned to one connection so all
    /// queries see the same database.
    pub async fn connect(url: &str) -> DeltaLogResult<Self> {
        let open_err = |source| DeltaLogError::Open {
            url: url.to_owned(),
            source,
        };

        let options = url
            .parse::<SqliteConnectOptions>()
            .map_err(open_err)?
            .create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(open_err)?;

        let log = Self { pool };
        log.ensure_schema().await.map_err(open_err)?;
        info!(%url, "opened local delta log");
        Ok(log)
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_deltas (
                key TEXT PRIMARY KEY NOT NULL,
                event_id TEXT NOT NULL,
                player_id INTEGER NOT NULL,
                points INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert(&self, mut record: PendingDeltaRecord) -> DeltaLogResult<PendingDeltaRecord> {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let result = sqlx::query(
                "INSERT INTO pending_deltas (key, event_id, player_id, points, timestamp_ms) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.key.as_str())
            .bind(&record.event_id)
            .bind(i64::from(record.player_id))
            .bind(record.points)
            .bind(record.timestamp_ms)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => {
                    debug!(key = %record.key, player_id = record.player_id, "delta persisted");
                    return Ok(record);
                }
                Err(err)
                    if err
                        .as_database_error()
                        .is_some_and(|db| db.is_unique_violation()) =>
                {
                    warn!(attempt, key = %record.key, "delta key collision; regenerating");
                    record.rekey();
                }
                Err(source) => {
                    return Err(DeltaLogError::Query {
                        operation: "insert",
                        source,
                    });
                }
            }
        }

        Err(DeltaLogError::KeyExhausted {
            attempts: MAX_KEY_ATTEMPTS,
        })
    }

    async fn select_pending(&self) -> DeltaLogResult<Vec<PendingDeltaRecord>> {
        let rows = sqlx::query_as::<_, (String, String, i64, i64, i64)>(
            "SELECT key, event_id, player_id, points, timestamp_ms \
             FROM pending_deltas ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|source| DeltaLogError::Query {
            operation: "select pending",
            source,
        })?;

        rows.into_iter()
            .map(|(key, event_id, player_id, points, timestamp_ms)| {
                let player_id =
                    u32::try_from(player_id).map_err(|_| DeltaLogError::Corrupt { key: key.clone() })?;
                Ok(PendingDeltaRecord {
                    key: DeltaKey::from_stored(key),
                    event_id,
                    player_id,
                    points,
                    timestamp_ms,
                })
            })
            .collect()
    }

    async fn delete(&self, keys: Vec<DeltaKey>) -> DeltaLogResult<u64> {
        let query_err = |source| DeltaLogError::Query {
            operation: "delete",
            source,
        };

        let mut tx = self.pool.begin().await.map_err(query_err)?;
        let mut removed = 0;
        for key in &keys {
            let result = sqlx::query("DELETE FROM pending_deltas WHERE key = ?")
                .bind(key.as_str())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(query_err)?;
        Ok(removed)
    }

    async fn count_pending(&self) -> DeltaLogResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_deltas")
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DeltaLogError::Query {
                operation: "count",
                source,
            })?;
        Ok(count.max(0) as u64)
    }
}

impl DeltaLog for SqliteDeltaLog {
    fn append(&self, delta: ScoreDelta) -> BoxFuture<'static, DeltaLogResult<PendingDeltaRecord>> {
        let log = self.clone();
        Box::pin(async move { log.insert(PendingDeltaRecord::new(delta)).await })
    }

    fn pending(&self) -> BoxFuture<'static, DeltaLogResult<Vec<PendingDeltaRecord>>> {
        let log = self.clone();
        Box::pin(async move { log.select_pending().await })
    }

    fn remove(&self, keys: Vec<DeltaKey>) -> BoxFuture<'static, DeltaLogResult<u64>> {
        let log = self.clone();
        Box::pin(async move { log.delete(keys).await })
    }

    fn count(&self) -> BoxFuture<'static, DeltaLogResult<u64>> {
        let log = self.clone();
        Box::pin(async move { log.count_pending().await })
    }
}

/// Shared handle to any delta log implementation.
pub type SharedDeltaLog = Arc<dyn DeltaLog>;

/// [`DeltaLog`] kept in process memory; nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryDeltaLog {
    records: Arc<Mutex<BTreeMap<DeltaKey, PendingDeltaRecord>>>,
}

impl MemoryDeltaLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<DeltaKey, PendingDeltaRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, mut record: PendingDeltaRecord) -> DeltaLogResult<PendingDeltaRecord> {
        let mut records = self.records();
        for _ in 0..MAX_KEY_ATTEMPTS {
            if !records.contains_key(&record.key) {
                records.insert(record.key.clone(), record.clone());
                return Ok(record);
            }
            record.rekey();
        }
        Err(DeltaLogError::KeyExhausted {
            attempts: MAX_KEY_ATTEMPTS,
        })
    }
}

impl DeltaLog for MemoryDeltaLog {
    fn append(&self, delta: ScoreDelta) -> BoxFuture<'static, DeltaLogResult<PendingDeltaRecord>> {
        let result = self.insert(PendingDeltaRecord::new(delta));
        Box::pin(async move { result })
    }

    fn pending(&self) -> BoxFuture<'static, DeltaLogResult<Vec<PendingDeltaRecord>>> {
        let records: Vec<_> = self.records().values().cloned().collect();
        Box::pin(async move { Ok(records) })
    }

    fn remove(&self, keys: Vec<DeltaKey>) -> BoxFuture<'static, DeltaLogResult<u64>> {
        let mut records = self.records();
        let removed = keys
            .iter()
            .filter(|key| records.remove(*key).is_some())
            .count() as u64;
        Box::pin(async move { Ok(removed) })
    }

    fn count(&self) -> BoxFuture<'static, DeltaLogResult<u64>> {
        let count = self.records().len() as u64;
        Box::pin(async move { Ok(count) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_log() -> SqliteDeltaLog {
        SqliteDeltaLog::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn append_then_read_back_in_order() {
        let log = memory_log().await;

        let first = log.append(ScoreDelta::kick("E", 1)).await.unwrap();
        let second = log.append(ScoreDelta::kick("E", 2)).await.unwrap();

        let pending = log.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&first));
        assert!(pending.contains(&second));
        assert_eq!(log.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_deletes_only_named_keys() {
        let log = memory_log().await;
        let keep = log.append(ScoreDelta::kick("E", 1)).await.unwrap();
        let drop_a = log.append(ScoreDelta::kick("E", 2)).await.unwrap();
        let drop_b = log.append(ScoreDelta::kick("E", 2)).await.unwrap();

        let removed = log.remove(vec![drop_a.key, drop_b.key]).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(log.pending().await.unwrap(), vec![keep]);
    }

    #[tokio::test]
    async fn colliding_key_is_regenerated() {
        let log = memory_log().await;
        let existing = log.append(ScoreDelta::kick("E", 1)).await.unwrap();

        let mut clash = PendingDeltaRecord::new(ScoreDelta::kick("E", 1));
        clash.key = existing.key.clone();
        let stored = log.insert(clash).await.unwrap();

        assert_ne!(stored.key, existing.key);
        assert_eq!(log.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn memory_log_removes_only_named_keys() {
        let log = MemoryDeltaLog::new();
        let keep = log.append(ScoreDelta::kick("E", 1)).await.unwrap();
        let gone = log.append(ScoreDelta::kick("E", 2)).await.unwrap();

        assert_eq!(log.remove(vec![gone.key.clone(), gone.key]).await.unwrap(), 1);
        assert_eq!(log.pending().await.unwrap(), vec![keep]);
        assert_eq!(log.count().await.unwrap(), 1);
    }
}
