use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::locks::{LockError, LockStoreError};
use crate::locks::reclaim::ReclaimError;
use crate::services::confirmation::ConfirmError;
use crate::services::seatmap::SeatMapError;

/// Error response in the `{ success, message, error }` envelope every
/// endpoint uses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "success": false,
            "message": self.message,
            "error": self.detail,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<LockError> for ApiError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::EventNotFound => ApiError::not_found("Event not found"),
            LockError::NoSeats => {
                ApiError::bad_request("Invalid seats data. Expected a non-empty array of seats.")
            }
            LockError::MissingSeats => ApiError::bad_request("Some seats do not exist"),
            LockError::Unavailable { seat_ids } => {
                ApiError::bad_request("Some seats are no longer available")
                    .with_detail(json!({ "unavailableSeats": seat_ids }))
            }
            LockError::Db(e) => {
                error!("lock manager db error: {:?}", e);
                ApiError::internal("Failed to lock seats")
            }
            LockError::Store(e) => {
                error!("lock store error: {:?}", e);
                ApiError::internal("Failed to lock seats")
            }
        }
    }
}

impl From<ConfirmError> for ApiError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::EventNotFound => ApiError::not_found("Event not found"),
            ConfirmError::UserNotFound => ApiError::not_found("User not found"),
            ConfirmError::NoSeats => ApiError::bad_request("Invalid booking data provided"),
            ConfirmError::LockNotHeld {
                row,
                seat_number,
                reason,
            } => ApiError::bad_request("Booking could not be confirmed").with_detail(json!({
                "row": row,
                "seatNumber": seat_number,
                "reason": reason,
            })),
            ConfirmError::SeatAlreadyBooked { row, seat_number } => {
                ApiError::bad_request("Booking could not be confirmed").with_detail(json!({
                    "row": row,
                    "seatNumber": seat_number,
                    "reason": "seat is already booked",
                }))
            }
            ConfirmError::Db(e) => {
                error!("confirmation db error: {:?}", e);
                ApiError::internal("Failed to confirm booking")
            }
            ConfirmError::Store(e) => {
                error!("confirmation lock store error: {:?}", e);
                ApiError::internal("Failed to confirm booking")
            }
        }
    }
}

impl From<SeatMapError> for ApiError {
    fn from(err: SeatMapError) -> Self {
        match err {
            SeatMapError::EventNotFound => ApiError::not_found("Event not found"),
            SeatMapError::VenueNotFound => ApiError::not_found("Venue not found for this event"),
            SeatMapError::Db(e) => {
                error!("seat map db error: {:?}", e);
                ApiError::internal("Failed to retrieve seat information")
            }
            SeatMapError::Store(e) => {
                error!("seat map lock store error: {:?}", e);
                ApiError::internal("Failed to retrieve seat information")
            }
        }
    }
}

impl From<ReclaimError> for ApiError {
    fn from(err: ReclaimError) -> Self {
        match err {
            ReclaimError::Db(e) => {
                error!("reclaimer db error: {:?}", e);
                ApiError::internal("Failed to release seat locks")
            }
            ReclaimError::Store(e) => {
                error!("reclaimer lock store error: {:?}", e);
                ApiError::internal("Failed to release seat locks")
            }
        }
    }
}

impl From<LockStoreError> for ApiError {
    fn from(err: LockStoreError) -> Self {
        error!("lock store error: {:?}", err);
        ApiError::internal("Lock store unavailable")
    }
}
