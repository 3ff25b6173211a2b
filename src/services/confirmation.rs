use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::Database;
use crate::locks::store::{event_seat_key, LockEntry, LockStore, LockStoreError};
use crate::locks::SeatRef;
use crate::models::{Booking, BookingStatus, Event, Seat, Ticket, TicketStatus, User};
use crate::services::tickets;

#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("event not found")]
    EventNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("no seats requested")]
    NoSeats,
    #[error("seat {row}-{seat_number}: {reason}")]
    LockNotHeld {
        row: String,
        seat_number: String,
        reason: String,
    },
    #[error("seat {row}-{seat_number} is already booked")]
    SeatAlreadyBooked { row: String, seat_number: String },
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] LockStoreError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSelection {
    pub row: String,
    pub seat_number: String,
    pub price: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    pub ticket_id: Uuid,
    pub seat_info: String,
    pub ticket_number: String,
    pub price: f64,
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBooking {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub seats: Vec<SeatRef>,
    pub tickets: Vec<IssuedTicket>,
    pub total_amount: f64,
    pub payment_method: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Converts a held lock session into a confirmed booking: validates every
/// lock entry up front, then creates the booking, tickets and payment and
/// flips the seats to booked inside one transaction. All requested seats
/// are booked together or none are.
#[derive(Clone)]
pub struct ConfirmationService {
    db: Database,
    store: LockStore,
}

impl ConfirmationService {
    pub fn new(db: Database, store: LockStore) -> Self {
        Self { db, store }
    }

    pub async fn confirm(
        &self,
        event_id: Uuid,
        lock_session_id: Uuid,
        seats: &[SeatSelection],
        payment_method: &str,
        amount: f64,
        user_id: Uuid,
    ) -> Result<ConfirmedBooking, ConfirmError> {
        if seats.is_empty() {
            return Err(ConfirmError::NoSeats);
        }

        // Pre-transaction gate: the stored session id is the sole ownership
        // proof. A missing or mismatched entry aborts the whole call before
        // any relational write happens; on failure the entries that do
        // exist are left untouched so the caller can retry before expiry.
        let mut lock_keys = Vec::with_capacity(seats.len());
        for seat in seats {
            let key = event_seat_key(event_id, &seat.row, &seat.seat_number);
            let entry = self.store.get(&key).await?;
            if let Some(reason) = gate_rejection(entry.as_ref(), lock_session_id) {
                return Err(ConfirmError::LockNotHeld {
                    row: seat.row.clone(),
                    seat_number: seat.seat_number.clone(),
                    reason: reason.into(),
                });
            }
            lock_keys.push(key);
        }

        let event = Event::find(event_id, &self.db.pool)
            .await?
            .ok_or(ConfirmError::EventNotFound)?;
        let user = User::find(user_id, &self.db.pool)
            .await?
            .ok_or(ConfirmError::UserNotFound)?;

        let mut tx = self.db.pool.begin().await?;

        let booking: Booking = sqlx::query_as(
            "INSERT INTO bookings (event_id, user_id, status, payment_status, total_amount)
             VALUES ($1, $2, 'CONFIRMED', 'PAID', $3)
             RETURNING id, event_id, user_id, status, payment_status, total_amount, created_at",
        )
        .bind(event_id)
        .bind(user.id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let mut issued = Vec::with_capacity(seats.len());

        for (i, selection) in seats.iter().enumerate() {
            let seat = Seat::get_or_create_for_event(
                &mut *tx,
                &event,
                &selection.row,
                &selection.seat_number,
            )
            .await?;

            if seat.status == crate::models::SeatStatus::Booked {
                // the lock entry lied; abort everything
                return Err(ConfirmError::SeatAlreadyBooked {
                    row: selection.row.clone(),
                    seat_number: selection.seat_number.clone(),
                });
            }

            sqlx::query(
                "UPDATE seats
                 SET status = 'booked', lock_time = NULL, lock_by = NULL, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(seat.id)
            .execute(&mut *tx)
            .await?;

            let price = selection
                .price
                .unwrap_or(if seat.price > 0.0 { seat.price } else { event.base_price });
            let ticket_id = Uuid::new_v4();
            let number = tickets::ticket_number(event_id, booking.id, i + 1);
            let seat_info = format!("{}-{}", seat.row_label, seat.seat_number);
            let qr =
                tickets::qr_payload(ticket_id, event_id, booking.id, user.id, &seat_info, &number);

            let ticket: Ticket = sqlx::query_as(
                "INSERT INTO tickets (id, booking_id, event_id, user_id, price, ticket_type,
                                      status, row_label, seat_number, section, ticket_number, qr_code)
                 VALUES ($1, $2, $3, $4, $5, 'REGULAR', 'VALID', $6, $7, $8, $9, $10)
                 RETURNING id, booking_id, event_id, user_id, price, ticket_type, status,
                           row_label, seat_number, section, ticket_number, qr_code, created_at",
            )
            .bind(ticket_id)
            .bind(booking.id)
            .bind(event_id)
            .bind(user.id)
            .bind(price)
            .bind(&seat.row_label)
            .bind(&seat.seat_number)
            .bind(&seat.section)
            .bind(&number)
            .bind(&qr)
            .fetch_one(&mut *tx)
            .await?;

            issued.push(IssuedTicket {
                ticket_id: ticket.id,
                seat_info,
                ticket_number: number,
                price: ticket.price,
                status: ticket.status,
            });
        }

        sqlx::query(
            "INSERT INTO payments (booking_id, user_id, method, amount, status, transaction_id)
             VALUES ($1, $2, $3, $4, 'SUCCESS', $5)",
        )
        .bind(booking.id)
        .bind(user.id)
        .bind(payment_method)
        .bind(amount)
        .bind(tickets::transaction_id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // Cleanup after commit is best-effort: a leftover entry simply
        // expires, and the booked status wins in every merged view.
        self.store.release_all(&lock_keys).await;

        info!(
            "booking {} confirmed for event {}: {} tickets",
            booking.id,
            event_id,
            issued.len()
        );

        Ok(ConfirmedBooking {
            booking_id: booking.id,
            event_id,
            seats: seats
                .iter()
                .map(|s| SeatRef {
                    row: s.row.clone(),
                    seat_number: s.seat_number.clone(),
                })
                .collect(),
            tickets: issued,
            total_amount: booking.total_amount,
            payment_method: payment_method.to_string(),
            status: booking.status,
            created_at: booking.created_at,
        })
    }
}

/// Per-seat gate applied before the transaction opens: the stored session
/// id is the sole ownership proof. Returns the rejection reason, or None
/// when the entry belongs to the presented session. Any rejection aborts
/// the whole confirmation, so no relational write ever happens for a batch
/// with a missing or foreign lock.
fn gate_rejection(entry: Option<&LockEntry>, lock_session_id: Uuid) -> Option<&'static str> {
    match entry {
        None => Some("seat is not locked or the lock has expired"),
        Some(e) if e.lock_session_id != lock_session_id => {
            Some("seat is locked by a different session")
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session: Uuid) -> LockEntry {
        LockEntry {
            event_id: Uuid::nil(),
            row: "A".into(),
            seat_number: "1".into(),
            lock_session_id: session,
            user_id: Uuid::nil(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn missing_lock_rejects_before_any_write() {
        assert_eq!(
            gate_rejection(None, Uuid::new_v4()),
            Some("seat is not locked or the lock has expired")
        );
    }

    #[test]
    fn foreign_session_rejects_before_any_write() {
        let e = entry(Uuid::new_v4());
        assert_eq!(
            gate_rejection(Some(&e), Uuid::new_v4()),
            Some("seat is locked by a different session")
        );
    }

    #[test]
    fn matching_session_passes_the_gate() {
        let session = Uuid::new_v4();
        let e = entry(session);
        assert_eq!(gate_rejection(Some(&e), session), None);
    }

    #[test]
    fn one_bad_seat_fails_a_batch() {
        // three held entries, one issued to a different session: the first
        // rejection aborts the whole confirmation
        let session = Uuid::new_v4();
        let held = [entry(session), entry(Uuid::new_v4()), entry(session)];

        let rejection = held
            .iter()
            .find_map(|e| gate_rejection(Some(e), session));

        assert_eq!(rejection, Some("seat is locked by a different session"));
    }
}
