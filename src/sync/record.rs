use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Intent to add `points` to a player's event total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScoreDelta {
    /// Event the score belongs to.
    pub event_id: String,
    /// Player identifier within the event.
    pub player_id: u32,
    /// Points to add; kicks always contribute `1`.
    pub points: i64,
}

impl ScoreDelta {
    /// A single point for `player_id`.
    pub fn kick(event_id: impl Into<String>, player_id: u32) -> Self {
        Self {
            event_id: event_id.into(),
            player_id,
            points: 1,
        }
    }
}

/// Unique key of a pending record: a zero-padded millisecond timestamp followed by a random
/// 64-bit tie-breaker, so keys sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaKey(String);

impl DeltaKey {
    /// Generate a fresh key for a record created at `timestamp_ms`.
    pub fn generate(timestamp_ms: i64) -> Self {
        Self(format!(
            "{:013}-{:016x}",
            timestamp_ms.max(0),
            rand::random::<u64>()
        ))
    }

    /// Wrap a key read back from storage.
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Borrow the textual key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeltaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable form of a [`ScoreDelta`], kept until the remote store acknowledged it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeltaRecord {
    /// Unique storage key.
    pub key: DeltaKey,
    /// Event the score belongs to.
    pub event_id: String,
    /// Player identifier within the event.
    pub player_id: u32,
    /// Points to add.
    pub points: i64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl PendingDeltaRecord {
    /// Stamp `delta` with the current time and a fresh key.
    pub fn new(delta: ScoreDelta) -> Self {
        let timestamp_ms = now_ms();
        Self {
            key: DeltaKey::generate(timestamp_ms),
            event_id: delta.event_id,
            player_id: delta.player_id,
            points: delta.points,
            timestamp_ms,
        }
    }

    /// Replace the key after a storage collision.
    pub fn rekey(&mut self) {
        self.key = DeltaKey::generate(self.timestamp_ms);
    }
}

/// Sum of pending points for one `(event, player)` pair, plus the records it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedDelta {
    /// Event the score belongs to.
    pub event_id: String,
    /// Player identifier within the event.
    pub player_id: u32,
    /// Total points across the source records.
    pub points: i64,
    /// Keys of the source records, deleted once the increment is acknowledged.
    pub keys: Vec<DeltaKey>,
}

/// Group pending records by `(event, player)`, preserving first-seen order.
pub fn aggregate(records: &[PendingDeltaRecord]) -> Vec<AggregatedDelta> {
    let mut totals: IndexMap<(&str, u32), AggregatedDelta> = IndexMap::new();

    for record in records {
        totals
            .entry((record.event_id.as_str(), record.player_id))
            .and_modify(|entry| {
                entry.points += record.points;
                entry.keys.push(record.key.clone());
            })
            .or_insert_with(|| AggregatedDelta {
                event_id: record.event_id.clone(),
                player_id: record.player_id,
                points: record.points,
                keys: vec![record.key.clone()],
            });
    }

    totals.into_values().collect()
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: &str, player: u32) -> PendingDeltaRecord {
        PendingDeltaRecord::new(ScoreDelta::kick(event, player))
    }

    #[test]
    fn aggregates_per_event_and_player() {
        let records = vec![
            record("E", 1),
            record("E", 2),
            record("E", 1),
            record("E", 1),
            record("E", 2),
            record("F", 1),
        ];

        let totals = aggregate(&records);
        let summary: Vec<(&str, u32, i64, usize)> = totals
            .iter()
            .map(|t| (t.event_id.as_str(), t.player_id, t.points, t.keys.len()))
            .collect();

        assert_eq!(
            summary,
            vec![("E", 1, 3, 3), ("E", 2, 2, 2), ("F", 1, 1, 1)]
        );
    }

    #[test]
    fn keys_are_unique_within_the_same_millisecond() {
        let a = DeltaKey::generate(1_700_000_000_000);
        let b = DeltaKey::generate(1_700_000_000_000);

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("1700000000000-"));
        assert_eq!(a.as_str().len(), 13 + 1 + 16);
    }
}
