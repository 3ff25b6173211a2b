use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::ok;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::confirmation::SeatSelection;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/bookings/confirm", post(confirm_booking))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBookingRequest {
    event_id: Uuid,
    lock_session_id: Uuid,
    seats: Vec<SeatSelection>,
    payment_method: String,
    amount: f64,
}

// POST /api/bookings/confirm
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.amount < 0.0 {
        return Err(ApiError::bad_request("amount must not be negative"));
    }
    if req.payment_method.is_empty() {
        return Err(ApiError::bad_request("paymentMethod is required"));
    }

    let booking = state
        .confirmations
        .confirm(
            req.event_id,
            req.lock_session_id,
            &req.seats,
            &req.payment_method,
            req.amount,
            user.user_id,
        )
        .await?;

    Ok(ok("Booking confirmed successfully", booking))
}
