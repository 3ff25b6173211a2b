use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::ok;
use crate::error::ApiError;
use crate::locks::SeatRef;
use crate::middleware::AuthUser;
use crate::services::seatmap;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/seats", get(get_seat_map))
        .route("/events/{event_id}/seats/lock", post(lock_seats))
        .route("/events/{event_id}/seats/unlock", post(unlock_seats))
        .route(
            "/events/{event_id}/seats/lock/remaining",
            get(lock_remaining_time),
        )
}

// GET /api/events/{event_id}/seats
//
// Assembled fresh on every request: lock-store expiry is silent, so a
// cached grid would show phantom locks.
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let map = seatmap::load_seat_map(event_id, &state.db, &state.lock_store).await?;
    Ok(ok("Seat information retrieved successfully", map))
}

#[derive(Debug, Deserialize)]
struct LockSeatsRequest {
    seats: Vec<SeatRef>,
}

// POST /api/events/{event_id}/seats/lock
async fn lock_seats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<LockSeatsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .locks
        .lock_seats(event_id, &req.seats, user.user_id)
        .await?;

    let message = format!("Successfully locked {} seats", outcome.locked_seats.len());
    Ok(ok(&message, outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockSeatsRequest {
    lock_session_id: Uuid,
    seats: Vec<SeatRef>,
}

// POST /api/events/{event_id}/seats/unlock
async fn unlock_seats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<UnlockSeatsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (unlocked, failed) = state
        .locks
        .unlock_seats(event_id, req.lock_session_id, &req.seats, user.user_id)
        .await?;

    let message = format!("Successfully unlocked {} seats", unlocked.len());
    Ok(ok(
        &message,
        json!({
            "unlockedSeats": unlocked,
            "failedSeats": failed,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemainingTimeQuery {
    lock_session_id: Uuid,
}

// GET /api/events/{event_id}/seats/lock/remaining?lockSessionId=...
async fn lock_remaining_time(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    _user: AuthUser,
    Query(query): Query<RemainingTimeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .locks
        .remaining_time(event_id, query.lock_session_id)
        .await?
    {
        Some((remaining, total, expires_at)) => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Lock remaining time retrieved successfully",
                "data": {
                    "remainingTime": remaining,
                    "totalTime": total,
                    "expiresAt": expires_at,
                },
            })),
        )),
        None => Err(ApiError::not_found("Lock has expired or does not exist")),
    }
}
