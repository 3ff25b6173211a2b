pub mod manager;
pub mod reclaim;
pub mod store;

pub use manager::{AdminLockOutcome, LockError, LockOutcome, SeatLockManager};
pub use reclaim::{LockReclaimer, LockStatusView, ReclaimOutcome};
pub use store::{LockEntry, LockStore, LockStoreError};

use serde::{Deserialize, Serialize};

/// A (row, seat number) pair as the client addresses seats before they are
/// materialized as relational rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRef {
    pub row: String,
    pub seat_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSeat {
    pub row: String,
    pub seat_number: String,
    pub reason: String,
}

impl FailedSeat {
    pub fn new(seat: &SeatRef, reason: impl Into<String>) -> Self {
        FailedSeat {
            row: seat.row.clone(),
            seat_number: seat.seat_number.clone(),
            reason: reason.into(),
        }
    }
}
