use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::database::Database;
use crate::locks::store::{event_seat_key, seat_id_key, LockStore, LockStoreError};
use crate::models::{effective_status, Seat, SeatStatus};

#[derive(Debug, thiserror::Error)]
pub enum ReclaimError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] LockStoreError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimOutcome {
    pub released_count: usize,
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatusView {
    pub seat_id: i64,
    pub relational_status: SeatStatus,
    pub effective_status: SeatStatus,
    pub lock_time: Option<DateTime<Utc>>,
    pub lock_owner: Option<Uuid>,
    pub lock_time_remaining: Option<i64>,
}

/// Reconciles the relational mirror with the lock store. The store expires
/// entries silently, so relationally `locked` rows whose soft-lock has
/// lapsed must be swept back to `available` here; nothing else depends on
/// this sweep for mutual exclusion.
#[derive(Clone)]
pub struct LockReclaimer {
    db: Database,
    store: LockStore,
    config: LockConfig,
}

impl LockReclaimer {
    pub fn new(db: Database, store: LockStore, config: LockConfig) -> Self {
        Self { db, store, config }
    }

    /// Releases relationally locked seats whose lock timestamp is older
    /// than the admin TTL window (the only flow that persists `locked`).
    pub async fn release_expired(&self) -> Result<ReclaimOutcome, ReclaimError> {
        let window = self.config.admin_ttl_seconds as i64;

        let mut tx = self.db.pool.begin().await?;

        let expired: Vec<Seat> = sqlx::query_as(
            "SELECT id, venue_id, event_id, row_label, seat_number, section, seat_type,
                    price, is_accessible, status, lock_time, lock_by
             FROM seats
             WHERE status = 'locked'
               AND lock_time < NOW() - ($1 * INTERVAL '1 second')
             FOR UPDATE SKIP LOCKED",
        )
        .bind(window)
        .fetch_all(&mut *tx)
        .await?;

        if expired.is_empty() {
            return Ok(ReclaimOutcome {
                released_count: 0,
                seat_ids: vec![],
            });
        }

        let seat_ids: Vec<i64> = expired.iter().map(|s| s.id).collect();

        sqlx::query(
            "UPDATE seats
             SET status = 'available', lock_time = NULL, lock_by = NULL, updated_at = NOW()
             WHERE id = ANY($1)",
        )
        .bind(&seat_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // Best-effort: the store entries are usually already gone via TTL
        let keys = lock_key_variants(&expired);
        self.store.release_all(&keys).await;

        info!("released {} expired seat locks", seat_ids.len());
        Ok(ReclaimOutcome {
            released_count: seat_ids.len(),
            seat_ids,
        })
    }

    /// Early release by seat id. Ownership is intentionally not checked
    /// here beyond authentication; see DESIGN.md before tightening.
    /// Idempotent: releasing already-free seats reports zero.
    pub async fn release_user_locks(
        &self,
        seat_ids: &[i64],
        _requester_id: Uuid,
    ) -> Result<ReclaimOutcome, ReclaimError> {
        let seats: Vec<Seat> = sqlx::query_as(
            "SELECT id, venue_id, event_id, row_label, seat_number, section, seat_type,
                    price, is_accessible, status, lock_time, lock_by
             FROM seats WHERE id = ANY($1)",
        )
        .bind(seat_ids)
        .fetch_all(&self.db.pool)
        .await?;

        let mut results = Vec::with_capacity(seats.len());

        for seat in &seats {
            let row_reset = sqlx::query(
                "UPDATE seats
                 SET status = 'available', lock_time = NULL, lock_by = NULL, updated_at = NOW()
                 WHERE id = $1 AND status = 'locked'",
            )
            .bind(seat.id)
            .execute(&self.db.pool)
            .await?
            .rows_affected()
                > 0;

            // both historical key formats are tried; deletion is idempotent
            let mut entry_removed = false;
            for key in seat_key_variants(seat) {
                match self.store.release(&key).await {
                    Ok(removed) => entry_removed |= removed,
                    Err(e) => warn!("failed to delete lock key {}: {:?}", key, e),
                }
            }

            results.push((seat.id, row_reset, entry_removed));
        }

        Ok(reclaim_outcome(results))
    }

    /// Merged view of one seat's lock state across both stores.
    pub async fn lock_status(&self, seat_id: i64) -> Result<Option<LockStatusView>, ReclaimError> {
        let Some(seat) = Seat::find(seat_id, &self.db.pool).await? else {
            return Ok(None);
        };

        let mut live_entry = None;
        let mut remaining = None;
        for key in seat_key_variants(&seat) {
            if let Some(entry) = self.store.get(&key).await? {
                remaining = self.store.ttl_seconds(&key).await?;
                live_entry = Some(entry);
                break;
            }
        }

        let owner = live_entry.as_ref().map(|e| e.user_id).or(seat.lock_by);

        Ok(Some(LockStatusView {
            seat_id: seat.id,
            relational_status: seat.status,
            effective_status: effective_status(seat.status, live_entry.is_some()),
            lock_time: seat.lock_time,
            lock_owner: owner,
            lock_time_remaining: remaining,
        }))
    }
}

fn seat_key_variants(seat: &Seat) -> Vec<String> {
    let mut keys = vec![seat_id_key(seat.id)];
    if let Some(event_id) = seat.event_id {
        keys.push(event_seat_key(event_id, &seat.row_label, &seat.seat_number));
    }
    keys
}

fn lock_key_variants(seats: &[Seat]) -> Vec<String> {
    seats.iter().flat_map(|s| seat_key_variants(s)).collect()
}

/// Folds per-seat (row reset, entry removed) results. A seat counts as
/// released only when something actually changed, so repeating the call
/// on the same ids reports zero.
fn reclaim_outcome(results: Vec<(i64, bool, bool)>) -> ReclaimOutcome {
    let seat_ids: Vec<i64> = results
        .into_iter()
        .filter(|(_, row_reset, entry_removed)| *row_reset || *entry_removed)
        .map(|(id, _, _)| id)
        .collect();
    ReclaimOutcome {
        released_count: seat_ids.len(),
        seat_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(id: i64, event_id: Option<Uuid>) -> Seat {
        Seat {
            id,
            venue_id: Uuid::nil(),
            event_id,
            row_label: "A".into(),
            seat_number: "1".into(),
            section: None,
            seat_type: "standard".into(),
            price: 100.0,
            is_accessible: false,
            status: SeatStatus::Locked,
            lock_time: None,
            lock_by: None,
        }
    }

    #[test]
    fn template_seat_has_only_id_variant() {
        let keys = seat_key_variants(&seat(7, None));
        assert_eq!(keys, vec!["seat:lock:7".to_string()]);
    }

    #[test]
    fn event_seat_has_both_variants() {
        let event_id = Uuid::nil();
        let keys = seat_key_variants(&seat(7, Some(event_id)));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], "seat:lock:7");
        assert_eq!(keys[1], format!("seat:lock:{event_id}:A:1"));
    }

    #[test]
    fn repeat_release_reports_zero() {
        // nothing transitioned on the second pass over the same ids
        let outcome = reclaim_outcome(vec![(1, false, false), (2, false, false)]);
        assert_eq!(outcome.released_count, 0);
        assert!(outcome.seat_ids.is_empty());
    }

    #[test]
    fn either_store_transition_counts_as_released() {
        let outcome = reclaim_outcome(vec![(1, true, false), (2, false, true), (3, false, false)]);
        assert_eq!(outcome.released_count, 2);
        assert_eq!(outcome.seat_ids, vec![1, 2]);
    }
}
