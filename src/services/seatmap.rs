use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::database::Database;
use crate::locks::store::{LockStore, LockStoreError};
use crate::models::{effective_status, Event, Seat, SeatStatus, Venue};

// This deployment renders a fixed grid for every event regardless of the
// venue-declared layout.
pub const GRID_ROWS: u32 = 10;
pub const GRID_COLS: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum SeatMapError {
    #[error("event not found")]
    EventNotFound,
    #[error("venue not found for this event")]
    VenueNotFound,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] LockStoreError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatCell {
    pub id: i64,
    pub seat_number: String,
    pub status: SeatStatus,
    pub price: f64,
    #[serde(rename = "type")]
    pub seat_type: String,
    pub is_accessible: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapStats {
    pub total_rows: u32,
    pub max_columns: u32,
    pub total_seats: u32,
    pub available_seats: u32,
    pub booked_seats: u32,
    pub locked_seats: u32,
    pub unavailable_seats: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub event_id: Uuid,
    pub venue_name: String,
    pub rows: BTreeMap<String, Vec<SeatCell>>,
    pub stats: SeatMapStats,
}

pub fn row_label(row: u32) -> String {
    char::from_u32('A' as u32 + row - 1)
        .map(String::from)
        .unwrap_or_default()
}

/// Whether a (row, seat number) pair falls inside the fixed grid, used to
/// accept lock requests for seats that were never materialized.
pub fn in_default_grid(row: &str, seat_number: &str) -> bool {
    let row_ok = matches!(row.as_bytes(), [c] if (b'A'..b'A' + GRID_ROWS as u8).contains(c));
    let col_ok = seat_number
        .parse::<u32>()
        .map(|n| (1..=GRID_COLS).contains(&n))
        .unwrap_or(false);
    row_ok && col_ok
}

/// Pure grid assembly: merges materialized seat rows with the set of live
/// lock-store claims. Positions with no relational row default to available
/// at the event base price, with the deployment's vip block (rows A-B,
/// columns 4-9) and wheelchair corner seats.
pub fn build_seat_map(
    event: &Event,
    venue_name: &str,
    event_seats: &[Seat],
    live_locks: &HashSet<(String, String)>,
) -> SeatMap {
    let mut by_position: HashMap<(String, String), &Seat> = HashMap::new();
    for seat in event_seats {
        by_position.insert((seat.row_label.clone(), seat.seat_number.clone()), seat);
    }

    let mut rows: BTreeMap<String, Vec<SeatCell>> = BTreeMap::new();
    let mut available = 0u32;
    let mut booked = 0u32;
    let mut locked = 0u32;
    let mut unavailable = 0u32;

    for row in 1..=GRID_ROWS {
        let row_key = row_label(row);
        let mut cells = Vec::with_capacity(GRID_COLS as usize);

        for col in 1..=GRID_COLS {
            let seat_number = col.to_string();
            let position = (row_key.clone(), seat_number.clone());

            let mut status = SeatStatus::Available;
            let mut seat_type = "standard".to_string();
            let mut is_accessible = false;
            // virtual id for positions that only exist in the grid
            let mut id = (row * 100 + col) as i64;

            if let Some(seat) = by_position.get(&position) {
                status = seat.status;
                seat_type = seat.seat_type.clone();
                is_accessible = seat.is_accessible;
                id = seat.id;
            } else {
                if row <= 2 && (4..=9).contains(&col) {
                    seat_type = "vip".to_string();
                } else if (row == 1 || row == GRID_ROWS) && (col == 1 || col == GRID_COLS) {
                    seat_type = "wheelchair".to_string();
                    is_accessible = true;
                }
            }

            let status = effective_status(status, live_locks.contains(&position));

            match status {
                SeatStatus::Available => available += 1,
                SeatStatus::Booked => booked += 1,
                SeatStatus::Locked => locked += 1,
                SeatStatus::Unavailable => unavailable += 1,
            }

            cells.push(SeatCell {
                id,
                seat_number,
                status,
                // every cell carries the event base price in this deployment
                price: event.base_price,
                seat_type,
                is_accessible,
            });
        }

        rows.insert(row_key, cells);
    }

    SeatMap {
        event_id: event.id,
        venue_name: venue_name.to_string(),
        rows,
        stats: SeatMapStats {
            total_rows: GRID_ROWS,
            max_columns: GRID_COLS,
            total_seats: GRID_ROWS * GRID_COLS,
            available_seats: available,
            booked_seats: booked,
            locked_seats: locked,
            unavailable_seats: unavailable,
        },
    }
}

/// Loads everything the grid needs and assembles it. Recomputed on every
/// request: lock-store expiry is silent, so this view can never be cached.
pub async fn load_seat_map(
    event_id: Uuid,
    db: &Database,
    store: &LockStore,
) -> Result<SeatMap, SeatMapError> {
    let event = Event::find(event_id, &db.pool)
        .await?
        .ok_or(SeatMapError::EventNotFound)?;
    let venue = Venue::find(event.venue_id, &db.pool)
        .await?
        .ok_or(SeatMapError::VenueNotFound)?;

    let event_seats: Vec<Seat> = sqlx::query_as(
        "SELECT id, venue_id, event_id, row_label, seat_number, section, seat_type,
                price, is_accessible, status, lock_time, lock_by
         FROM seats
         WHERE event_id = $1
         ORDER BY row_label, seat_number",
    )
    .bind(event_id)
    .fetch_all(&db.pool)
    .await?;

    let live_locks: HashSet<(String, String)> = store
        .entries_for_event(event_id)
        .await?
        .into_iter()
        .map(|entry| (entry.row, entry.seat_number))
        .collect();

    Ok(build_seat_map(&event, &venue.name, &event_seats, &live_locks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            name: "Test Event".into(),
            description: None,
            base_price: 80.0,
            status: "published".into(),
            start_time: Utc::now(),
        }
    }

    fn seat(event_id: Uuid, row: &str, number: &str, status: SeatStatus) -> Seat {
        Seat {
            id: 1,
            venue_id: Uuid::nil(),
            event_id: Some(event_id),
            row_label: row.into(),
            seat_number: number.into(),
            section: None,
            seat_type: "standard".into(),
            price: 80.0,
            is_accessible: false,
            status,
            lock_time: None,
            lock_by: None,
        }
    }

    #[test]
    fn empty_event_is_fully_available() {
        let ev = event();
        let map = build_seat_map(&ev, "Main Hall", &[], &HashSet::new());
        assert_eq!(map.stats.total_seats, 120);
        assert_eq!(map.stats.available_seats, 120);
        assert_eq!(map.stats.booked_seats, 0);
        assert_eq!(map.rows.len(), 10);
        assert!(map.rows.values().all(|cells| cells.len() == 12));
    }

    #[test]
    fn booked_seat_counted_and_shown() {
        let ev = event();
        let seats = vec![seat(ev.id, "A", "1", SeatStatus::Booked)];
        let map = build_seat_map(&ev, "Main Hall", &seats, &HashSet::new());
        assert_eq!(map.stats.booked_seats, 1);
        assert_eq!(map.stats.available_seats, 119);
        assert_eq!(map.rows["A"][0].status, SeatStatus::Booked);
    }

    #[test]
    fn live_lock_marks_unmaterialized_seat_locked() {
        let ev = event();
        let locks: HashSet<_> = [("C".to_string(), "7".to_string())].into();
        let map = build_seat_map(&ev, "Main Hall", &[], &locks);
        assert_eq!(map.stats.locked_seats, 1);
        assert_eq!(map.rows["C"][6].status, SeatStatus::Locked);
    }

    #[test]
    fn live_lock_never_downgrades_booked() {
        let ev = event();
        let seats = vec![seat(ev.id, "B", "2", SeatStatus::Booked)];
        let locks: HashSet<_> = [("B".to_string(), "2".to_string())].into();
        let map = build_seat_map(&ev, "Main Hall", &seats, &locks);
        assert_eq!(map.rows["B"][1].status, SeatStatus::Booked);
        assert_eq!(map.stats.booked_seats, 1);
        assert_eq!(map.stats.locked_seats, 0);
    }

    #[test]
    fn default_vip_and_wheelchair_placement() {
        let ev = event();
        let map = build_seat_map(&ev, "Main Hall", &[], &HashSet::new());
        assert_eq!(map.rows["A"][3].seat_type, "vip"); // A4
        assert_eq!(map.rows["B"][8].seat_type, "vip"); // B9
        assert_eq!(map.rows["J"][0].seat_type, "wheelchair"); // J1
        assert!(map.rows["J"][0].is_accessible);
        assert_eq!(map.rows["E"][5].seat_type, "standard");
    }

    #[test]
    fn materialized_seat_overrides_grid_defaults() {
        let ev = event();
        let mut s = seat(ev.id, "A", "5", SeatStatus::Available);
        s.seat_type = "standard".into();
        let map = build_seat_map(&ev, "Main Hall", &[s], &HashSet::new());
        // A5 would default to vip, but the relational row wins
        assert_eq!(map.rows["A"][4].seat_type, "standard");
    }

    #[test]
    fn every_cell_carries_base_price() {
        let ev = event();
        let mut s = seat(ev.id, "D", "3", SeatStatus::Available);
        s.price = 999.0;
        let map = build_seat_map(&ev, "Main Hall", &[s], &HashSet::new());
        assert_eq!(map.rows["D"][2].price, 80.0);
    }

    #[test]
    fn grid_bounds() {
        assert!(in_default_grid("A", "1"));
        assert!(in_default_grid("J", "12"));
        assert!(!in_default_grid("K", "1"));
        assert!(!in_default_grid("A", "13"));
        assert!(!in_default_grid("A", "0"));
        assert!(!in_default_grid("AA", "1"));
        assert!(!in_default_grid("A", "x"));
    }

    #[test]
    fn row_labels_are_letters() {
        assert_eq!(row_label(1), "A");
        assert_eq!(row_label(10), "J");
    }
}
