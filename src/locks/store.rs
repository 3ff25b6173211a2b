use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::redis_client::RedisClient;

const SEAT_LOCK_PREFIX: &str = "seat:lock:";

#[derive(Debug, thiserror::Error)]
pub enum LockStoreError {
    #[error("lock store error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("lock entry serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Value stored under a seat lock key. The store's TTL is the sole expiry
/// mechanism; nothing here is authoritative once the key is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub event_id: Uuid,
    pub row: String,
    pub seat_number: String,
    pub lock_session_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Composite key for a per-event seat lock, the format the public booking
/// flow uses.
pub fn event_seat_key(event_id: Uuid, row: &str, seat_number: &str) -> String {
    format!("{SEAT_LOCK_PREFIX}{event_id}:{row}:{seat_number}")
}

/// Legacy per-seat-id key, still written by the admin flow and checked on
/// release so older locks are reclaimable.
pub fn seat_id_key(seat_id: i64) -> String {
    format!("{SEAT_LOCK_PREFIX}{seat_id}")
}

/// The expiring lock store: a thin layer over Redis providing the four
/// primitives the reservation core needs (set-if-absent with TTL,
/// existence/TTL query, idempotent delete, per-event scan).
#[derive(Clone)]
pub struct LockStore {
    redis: RedisClient,
}

impl LockStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Atomically claims `key` for `entry` unless a live entry already
    /// exists. Returns false when another request won the race.
    pub async fn acquire(
        &self,
        key: &str,
        entry: &LockEntry,
        ttl_seconds: u64,
    ) -> Result<bool, LockStoreError> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.redis.conn.clone();

        // SET NX EX is the distributed mutex: exactly one winner per key
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    /// Unconditionally writes `key`, replacing any previous holder. Only
    /// callers that already own the seat through the relational row may use
    /// this; everyone else goes through `acquire`.
    pub async fn put(
        &self,
        key: &str,
        entry: &LockEntry,
        ttl_seconds: u64,
    ) -> Result<(), LockStoreError> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set_ex(key, payload, ttl_seconds).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<LockEntry>, LockStoreError> {
        let mut conn = self.redis.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            None => Ok(None),
            Some(data) => match serde_json::from_str(&data) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    warn!("malformed lock entry under {}: {}", key, e);
                    Ok(None)
                }
            },
        }
    }

    /// Remaining TTL in seconds, or None when the key is gone (or has no
    /// expiry, which only happens for keys written out-of-band).
    pub async fn ttl_seconds(&self, key: &str) -> Result<Option<i64>, LockStoreError> {
        let mut conn = self.redis.conn.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }

    /// Deletes `key`; returns whether an entry actually existed. Deleting
    /// an absent key is not an error.
    pub async fn release(&self, key: &str) -> Result<bool, LockStoreError> {
        let mut conn = self.redis.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Best-effort batch delete. Store failures are logged and swallowed;
    /// by the time this runs the relational state is already correct.
    pub async fn release_all(&self, keys: &[String]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let mut conn = self.redis.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.del(key);
        }
        match pipe.query_async::<Vec<i64>>(&mut conn).await {
            Ok(counts) => counts.into_iter().filter(|n| *n > 0).count(),
            Err(e) => {
                warn!("failed to clear lock entries: {:?}", e);
                0
            }
        }
    }

    pub async fn keys_for_event(&self, event_id: Uuid) -> Result<Vec<String>, LockStoreError> {
        let mut conn = self.redis.conn.clone();
        let pattern = format!("{SEAT_LOCK_PREFIX}{event_id}:*");
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    /// All live lock entries for an event. Entries that expire between the
    /// scan and the read, and malformed values, are skipped.
    pub async fn entries_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<LockEntry>, LockStoreError> {
        let keys = self.keys_for_event(event_id).await?;
        let reads = futures::future::try_join_all(keys.iter().map(|key| self.get(key))).await?;
        Ok(reads.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_seat_key_format() {
        let event_id = Uuid::nil();
        assert_eq!(
            event_seat_key(event_id, "A", "5"),
            format!("seat:lock:{event_id}:A:5")
        );
    }

    #[test]
    fn seat_id_key_format() {
        assert_eq!(seat_id_key(42), "seat:lock:42");
    }

    #[test]
    fn lock_entry_serializes_camel_case() {
        let entry = LockEntry {
            event_id: Uuid::nil(),
            row: "A".into(),
            seat_number: "1".into(),
            lock_session_id: Uuid::nil(),
            user_id: Uuid::nil(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("lockSessionId").is_some());
        assert!(json.get("seatNumber").is_some());
        assert!(json.get("eventId").is_some());
    }

    #[test]
    fn lock_entry_round_trips() {
        let entry = LockEntry {
            event_id: Uuid::new_v4(),
            row: "B".into(),
            seat_number: "12".into(),
            lock_session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        let parsed: LockEntry =
            serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(parsed.lock_session_id, entry.lock_session_id);
        assert_eq!(parsed.row, entry.row);
        assert_eq!(parsed.seat_number, entry.seat_number);
    }
}
