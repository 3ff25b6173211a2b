use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Locked,
    Booked,
    Unavailable,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Locked => "locked",
            SeatStatus::Booked => "booked",
            SeatStatus::Unavailable => "unavailable",
        }
    }
}

/// A seat row. `event_id` is NULL for venue-template seats; event-scoped
/// copies are materialized lazily on first reference.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub venue_id: Uuid,
    pub event_id: Option<Uuid>,
    pub row_label: String,
    pub seat_number: String,
    pub section: Option<String>,
    pub seat_type: String,
    pub price: f64,
    pub is_accessible: bool,
    pub status: SeatStatus,
    pub lock_time: Option<DateTime<Utc>>,
    pub lock_by: Option<Uuid>,
}

const SEAT_COLUMNS: &str = "id, venue_id, event_id, row_label, seat_number, section, \
     seat_type, price, is_accessible, status, lock_time, lock_by";

impl Seat {
    pub async fn find(id: i64, pool: &sqlx::PgPool) -> Result<Option<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_event(
        conn: &mut sqlx::PgConnection,
        event_id: Uuid,
        row: &str,
        seat_number: &str,
    ) -> Result<Option<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats
             WHERE event_id = $1 AND row_label = $2 AND seat_number = $3"
        ))
        .bind(event_id)
        .bind(row)
        .bind(seat_number)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_venue_template(
        conn: &mut sqlx::PgConnection,
        venue_id: Uuid,
        row: &str,
        seat_number: &str,
    ) -> Result<Option<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats
             WHERE venue_id = $1 AND event_id IS NULL
               AND row_label = $2 AND seat_number = $3"
        ))
        .bind(venue_id)
        .bind(row)
        .bind(seat_number)
        .fetch_optional(conn)
        .await
    }

    /// Memoized factory for event seats (the lazy materialization policy):
    /// resolves the event-scoped row, creating it from the venue template on
    /// first reference, and creating the template itself when the venue has
    /// never declared this position. Idempotent under concurrent callers:
    /// the partial unique indexes turn the inserts into set-if-absent, and a
    /// losing insert falls back to re-selecting the winner's row.
    ///
    /// Must run inside the caller's transaction; the returned row is
    /// locked FOR UPDATE.
    pub async fn get_or_create_for_event(
        conn: &mut sqlx::PgConnection,
        event: &Event,
        row: &str,
        seat_number: &str,
    ) -> Result<Seat, sqlx::Error> {
        if let Some(seat) = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats
             WHERE event_id = $1 AND row_label = $2 AND seat_number = $3
             FOR UPDATE"
        ))
        .bind(event.id)
        .bind(row)
        .bind(seat_number)
        .fetch_optional(&mut *conn)
        .await?
        {
            return Ok(seat);
        }

        let mut template = Self::find_venue_template(conn, event.venue_id, row, seat_number).await?;

        if template.is_none() {
            sqlx::query(
                "INSERT INTO seats (venue_id, row_label, seat_number, section, seat_type,
                                    price, is_accessible, status)
                 VALUES ($1, $2, $3, 'General', 'standard', $4, FALSE, 'available')
                 ON CONFLICT (venue_id, row_label, seat_number) WHERE event_id IS NULL
                 DO NOTHING",
            )
            .bind(event.venue_id)
            .bind(row)
            .bind(seat_number)
            .bind(event.base_price)
            .execute(&mut *conn)
            .await?;

            template = Self::find_venue_template(conn, event.venue_id, row, seat_number).await?;
        }

        let (section, seat_type, price, is_accessible) = match &template {
            Some(t) => (
                t.section.clone(),
                t.seat_type.clone(),
                if t.price > 0.0 { t.price } else { event.base_price },
                t.is_accessible,
            ),
            None => (
                Some("General".to_string()),
                "standard".to_string(),
                event.base_price,
                false,
            ),
        };

        let created = sqlx::query_as::<_, Seat>(&format!(
            "INSERT INTO seats (venue_id, event_id, row_label, seat_number, section,
                                seat_type, price, is_accessible, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'available')
             ON CONFLICT (event_id, row_label, seat_number) WHERE event_id IS NOT NULL
             DO NOTHING
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(event.venue_id)
        .bind(event.id)
        .bind(row)
        .bind(seat_number)
        .bind(section)
        .bind(seat_type)
        .bind(price)
        .bind(is_accessible)
        .fetch_optional(&mut *conn)
        .await?;

        match created {
            Some(seat) => Ok(seat),
            // a concurrent transaction materialized it first
            None => {
                sqlx::query_as::<_, Seat>(&format!(
                    "SELECT {SEAT_COLUMNS} FROM seats
                     WHERE event_id = $1 AND row_label = $2 AND seat_number = $3
                     FOR UPDATE"
                ))
                .bind(event.id)
                .bind(row)
                .bind(seat_number)
                .fetch_one(conn)
                .await
            }
        }
    }
}

/// The single merge point for the two consistency sources: the stored
/// relational status and the presence of a live lock-store entry.
/// Every read path (seat map, lock status, confirmation pre-check) goes
/// through here; the lock store expires entries silently, so the stored
/// status alone cannot be trusted.
pub fn effective_status(stored: SeatStatus, live_lock: bool) -> SeatStatus {
    match stored {
        SeatStatus::Booked => SeatStatus::Booked,
        SeatStatus::Unavailable => SeatStatus::Unavailable,
        SeatStatus::Locked => SeatStatus::Locked,
        SeatStatus::Available => {
            if live_lock {
                SeatStatus::Locked
            } else {
                SeatStatus::Available
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn booked_wins_over_live_lock() {
        assert_eq!(effective_status(SeatStatus::Booked, true), SeatStatus::Booked);
        assert_eq!(effective_status(SeatStatus::Booked, false), SeatStatus::Booked);
    }

    #[test]
    fn live_lock_overrides_available() {
        assert_eq!(effective_status(SeatStatus::Available, true), SeatStatus::Locked);
        assert_eq!(
            effective_status(SeatStatus::Available, false),
            SeatStatus::Available
        );
    }

    #[test]
    fn relational_lock_shown_even_after_store_expiry() {
        // the reclaimer resets these rows; until it runs they still read locked
        assert_eq!(effective_status(SeatStatus::Locked, false), SeatStatus::Locked);
    }

    #[test]
    fn unavailable_is_never_masked() {
        assert_eq!(
            effective_status(SeatStatus::Unavailable, true),
            SeatStatus::Unavailable
        );
    }

    fn any_status() -> impl Strategy<Value = SeatStatus> {
        prop_oneof![
            Just(SeatStatus::Available),
            Just(SeatStatus::Locked),
            Just(SeatStatus::Booked),
            Just(SeatStatus::Unavailable),
        ]
    }

    proptest! {
        #[test]
        fn merge_never_invents_booked(stored in any_status(), live in any::<bool>()) {
            let merged = effective_status(stored, live);
            prop_assert!(merged != SeatStatus::Booked || stored == SeatStatus::Booked);
        }

        #[test]
        fn merge_is_stable_without_live_lock(stored in any_status()) {
            prop_assert_eq!(effective_status(stored, false), stored);
        }
    }
}
