use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::LockConfig;
use crate::database::Database;
use crate::locks::store::{event_seat_key, seat_id_key, LockEntry, LockStore, LockStoreError};
use crate::locks::{FailedSeat, SeatRef};
use crate::models::{Event, Seat, SeatStatus};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("event not found")]
    EventNotFound,
    #[error("no seats requested")]
    NoSeats,
    #[error("some seats do not exist")]
    MissingSeats,
    #[error("some seats are no longer available")]
    Unavailable { seat_ids: Vec<i64> },
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] LockStoreError),
}

/// Result of the public batch lock: one session id shared by every seat
/// locked in the call, plus per-seat success/failure lists so the caller
/// can retry only the failed subset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOutcome {
    pub lock_session_id: Uuid,
    pub ttl: u64,
    pub locked_seats: Vec<SeatRef>,
    pub failed_seats: Vec<FailedSeat>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLockOutcome {
    pub event_id: Uuid,
    pub seat_ids: Vec<i64>,
    pub lock_session_id: Uuid,
    pub locked_until: DateTime<Utc>,
    pub lock_timeout_seconds: u64,
}

/// Orchestrates claiming a batch of seats. Two disciplines share this type:
/// the public flow trades strict relational consistency for throughput (the
/// lock-store entry is the only write), while the admin flow persists
/// `locked` on the seat rows inside an all-or-nothing transaction.
#[derive(Clone)]
pub struct SeatLockManager {
    db: Database,
    store: LockStore,
    config: LockConfig,
}

impl SeatLockManager {
    pub fn new(db: Database, store: LockStore, config: LockConfig) -> Self {
        Self { db, store, config }
    }

    pub fn public_ttl(&self) -> u64 {
        self.config.public_ttl_seconds
    }

    /// Public best-effort flow: per-seat validation, then set-if-absent in
    /// the lock store. Seat rows are not mutated here; readers see the lock
    /// through the merged view, and the relational mirror only changes at
    /// confirmation time.
    pub async fn lock_seats(
        &self,
        event_id: Uuid,
        seats: &[SeatRef],
        user_id: Uuid,
    ) -> Result<LockOutcome, LockError> {
        if seats.is_empty() {
            return Err(LockError::NoSeats);
        }

        let event = Event::find(event_id, &self.db.pool)
            .await?
            .ok_or(LockError::EventNotFound)?;

        let lock_session_id = Uuid::new_v4();
        let ttl = self.config.public_ttl_seconds;
        let mut locked_seats = Vec::new();
        let mut failed_seats = Vec::new();

        for seat in seats {
            if seat.row.is_empty() || seat.seat_number.is_empty() {
                failed_seats.push(FailedSeat::new(seat, "Invalid seat data"));
                continue;
            }

            match self.check_seat_lockable(&event, seat).await? {
                Some(reason) => {
                    failed_seats.push(FailedSeat::new(seat, reason));
                    continue;
                }
                None => {}
            }

            let entry = LockEntry {
                event_id,
                row: seat.row.clone(),
                seat_number: seat.seat_number.clone(),
                lock_session_id,
                user_id,
                timestamp: Utc::now(),
            };
            let key = event_seat_key(event_id, &seat.row, &seat.seat_number);

            // exactly one concurrent caller wins this per-key race
            if self.store.acquire(&key, &entry, ttl).await? {
                locked_seats.push(seat.clone());
            } else {
                failed_seats.push(FailedSeat::new(
                    seat,
                    "Seat is temporarily locked by another user",
                ));
            }
        }

        Ok(LockOutcome {
            lock_session_id,
            ttl,
            locked_seats,
            failed_seats,
            expires_at: Utc::now() + Duration::seconds(ttl as i64),
        })
    }

    /// Relational pre-checks for one seat in the public flow. Returns a
    /// rejection reason, or None when the seat may be claimed.
    async fn check_seat_lockable(
        &self,
        event: &Event,
        seat: &SeatRef,
    ) -> Result<Option<String>, LockError> {
        let mut conn = self.db.pool.acquire().await?;

        let event_seat =
            Seat::find_for_event(&mut *conn, event.id, &seat.row, &seat.seat_number).await?;

        match event_seat {
            Some(s) if s.status != SeatStatus::Available => Ok(Some(format!(
                "Seat is already {}",
                s.status.as_str()
            ))),
            Some(_) => Ok(None),
            None => {
                // never materialized for this event: lockable as long as the
                // position exists in the venue template or the fixed grid
                let template = Seat::find_venue_template(
                    &mut *conn,
                    event.venue_id,
                    &seat.row,
                    &seat.seat_number,
                )
                .await?;
                if template.is_none()
                    && !crate::services::seatmap::in_default_grid(&seat.row, &seat.seat_number)
                {
                    return Ok(Some("Seat not found".to_string()));
                }
                Ok(None)
            }
        }
    }

    /// Admin strict flow: all requested seats are locked inside one
    /// transaction or none are. Rows are taken FOR UPDATE to close the
    /// check-then-write race, then flipped to `locked` with owner and
    /// timestamp; the lock-store entry mirrors the claim with the shorter
    /// admin TTL.
    pub async fn lock_seats_strict(
        &self,
        event_id: Uuid,
        seat_ids: &[i64],
        user_id: Uuid,
    ) -> Result<AdminLockOutcome, LockError> {
        if seat_ids.is_empty() {
            return Err(LockError::NoSeats);
        }

        let event = Event::find(event_id, &self.db.pool)
            .await?
            .ok_or(LockError::EventNotFound)?;

        let mut tx = self.db.pool.begin().await?;

        let seats: Vec<Seat> = sqlx::query_as(
            "SELECT id, venue_id, event_id, row_label, seat_number, section, seat_type,
                    price, is_accessible, status, lock_time, lock_by
             FROM seats
             WHERE id = ANY($1) AND event_id = $2
             FOR UPDATE",
        )
        .bind(seat_ids)
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

        if seats.len() != seat_ids.len() {
            // tx dropped here, rolling back
            return Err(LockError::MissingSeats);
        }

        let unavailable: Vec<i64> = seats
            .iter()
            .filter(|s| s.status != SeatStatus::Available)
            .map(|s| s.id)
            .collect();
        if !unavailable.is_empty() {
            return Err(LockError::Unavailable {
                seat_ids: unavailable,
            });
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE seats
             SET status = 'locked', lock_time = $1, lock_by = $2, updated_at = NOW()
             WHERE id = ANY($3)",
        )
        .bind(now)
        .bind(user_id)
        .bind(seat_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // Mirror the claim into the lock store. This is best-effort: if a
        // write fails the row stays locked and the reclaimer expires it.
        // Overwrite, not NX: the committed transaction owns these rows, so a
        // stale entry under the key must not survive with the old owner.
        let ttl = self.config.admin_ttl_seconds;
        let lock_session_id = Uuid::new_v4();
        for (key, entry) in mirror_entries(event.id, &seats, lock_session_id, user_id, now) {
            if let Err(e) = self.store.put(&key, &entry, ttl).await {
                tracing::warn!("failed to mirror admin lock under {}: {:?}", key, e);
            }
        }

        Ok(AdminLockOutcome {
            event_id,
            seat_ids: seat_ids.to_vec(),
            lock_session_id,
            locked_until: now + Duration::seconds(ttl as i64),
            lock_timeout_seconds: ttl,
        })
    }

    /// Releases seats held by a lock session in the public flow. A seat
    /// fails when no live entry exists, or when the presented session id or
    /// requester does not match the entry.
    pub async fn unlock_seats(
        &self,
        event_id: Uuid,
        lock_session_id: Uuid,
        seats: &[SeatRef],
        user_id: Uuid,
    ) -> Result<(Vec<SeatRef>, Vec<FailedSeat>), LockError> {
        if seats.is_empty() {
            return Err(LockError::NoSeats);
        }

        let mut unlocked = Vec::new();
        let mut failed = Vec::new();

        for seat in seats {
            if seat.row.is_empty() || seat.seat_number.is_empty() {
                failed.push(FailedSeat::new(seat, "Invalid seat data"));
                continue;
            }

            let key = event_seat_key(event_id, &seat.row, &seat.seat_number);
            let entry = self.store.get(&key).await?;
            if let Some(reason) = unlock_rejection(entry.as_ref(), lock_session_id, user_id) {
                failed.push(FailedSeat::new(seat, reason));
                continue;
            }

            self.store.release(&key).await?;
            unlocked.push(seat.clone());
        }

        Ok((unlocked, failed))
    }

    /// Remaining time for a lock session: scans the event's live entries and
    /// reports the TTL of those belonging to the session.
    pub async fn remaining_time(
        &self,
        event_id: Uuid,
        lock_session_id: Uuid,
    ) -> Result<Option<(i64, u64, DateTime<Utc>)>, LockError> {
        let keys = self.store.keys_for_event(event_id).await?;

        for key in keys {
            let Some(entry) = self.store.get(&key).await? else {
                continue;
            };
            if entry.lock_session_id != lock_session_id {
                continue;
            }
            if let Some(ttl) = self.store.ttl_seconds(&key).await? {
                let expires_at = Utc::now() + Duration::seconds(ttl);
                return Ok(Some((ttl, self.config.public_ttl_seconds, expires_at)));
            }
        }

        Ok(None)
    }
}

/// Why a held seat may not be unlocked by this caller, or None when both
/// the presented session id and the requester match the live entry.
fn unlock_rejection(
    entry: Option<&LockEntry>,
    lock_session_id: Uuid,
    user_id: Uuid,
) -> Option<&'static str> {
    match entry {
        None => Some("Seat is not locked"),
        Some(e) if e.lock_session_id != lock_session_id => {
            Some("Seat is locked by a different session")
        }
        Some(e) if e.user_id != user_id => Some("Seat is locked by another user"),
        Some(_) => None,
    }
}

/// Store mirror for an admin claim: one seat-id keyed entry per locked row,
/// all sharing the claim's session id.
fn mirror_entries(
    event_id: Uuid,
    seats: &[Seat],
    lock_session_id: Uuid,
    user_id: Uuid,
    timestamp: DateTime<Utc>,
) -> Vec<(String, LockEntry)> {
    seats
        .iter()
        .map(|seat| {
            (
                seat_id_key(seat.id),
                LockEntry {
                    event_id,
                    row: seat.row_label.clone(),
                    seat_number: seat.seat_number.clone(),
                    lock_session_id,
                    user_id,
                    timestamp,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session: Uuid, user: Uuid) -> LockEntry {
        LockEntry {
            event_id: Uuid::nil(),
            row: "A".into(),
            seat_number: "1".into(),
            lock_session_id: session,
            user_id: user,
            timestamp: Utc::now(),
        }
    }

    fn seat(id: i64, row: &str, number: &str) -> Seat {
        Seat {
            id,
            venue_id: Uuid::nil(),
            event_id: None,
            row_label: row.into(),
            seat_number: number.into(),
            section: None,
            seat_type: "standard".into(),
            price: 0.0,
            is_accessible: false,
            status: SeatStatus::Available,
            lock_time: None,
            lock_by: None,
        }
    }

    #[test]
    fn unlock_rejects_missing_entry() {
        assert_eq!(
            unlock_rejection(None, Uuid::new_v4(), Uuid::new_v4()),
            Some("Seat is not locked")
        );
    }

    #[test]
    fn unlock_rejects_foreign_session() {
        let user = Uuid::new_v4();
        let e = entry(Uuid::new_v4(), user);
        assert_eq!(
            unlock_rejection(Some(&e), Uuid::new_v4(), user),
            Some("Seat is locked by a different session")
        );
    }

    #[test]
    fn unlock_rejects_foreign_user() {
        let session = Uuid::new_v4();
        let e = entry(session, Uuid::new_v4());
        assert_eq!(
            unlock_rejection(Some(&e), session, Uuid::new_v4()),
            Some("Seat is locked by another user")
        );
    }

    #[test]
    fn unlock_allows_matching_owner() {
        let session = Uuid::new_v4();
        let user = Uuid::new_v4();
        let e = entry(session, user);
        assert_eq!(unlock_rejection(Some(&e), session, user), None);
    }

    #[test]
    fn admin_mirror_uses_seat_id_keys_and_shared_session() {
        let event_id = Uuid::new_v4();
        let session = Uuid::new_v4();
        let user = Uuid::new_v4();
        let seats = vec![seat(7, "A", "1"), seat(9, "B", "3")];

        let entries = mirror_entries(event_id, &seats, session, user, Utc::now());

        assert_eq!(entries[0].0, "seat:lock:7");
        assert_eq!(entries[1].0, "seat:lock:9");
        assert!(entries.iter().all(|(_, e)| e.lock_session_id == session));
        assert_eq!(entries[1].1.row, "B");
        assert_eq!(entries[1].1.seat_number, "3");
    }
}
