use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::ok;
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthUser};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/seats/lock", post(lock_seats_strict))
        .route("/admin/seats/release-expired", post(release_expired_locks))
        .route("/admin/seats/release", post(release_user_locks))
        .route("/admin/seats/{seat_id}/lock", get(get_lock_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminLockRequest {
    event_id: Uuid,
    seat_ids: Vec<i64>,
}

// POST /api/admin/seats/lock
//
// The strict discipline: all requested seats are locked in one
// transaction, and the relational rows carry the lock owner and timestamp.
async fn lock_seats_strict(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Json(req): Json<AdminLockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .locks
        .lock_seats_strict(req.event_id, &req.seat_ids, user.user_id)
        .await?;
    Ok(ok("Seats locked successfully", outcome))
}

// POST /api/admin/seats/release-expired
async fn release_expired_locks(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.reclaimer.release_expired().await?;
    let message = if outcome.released_count == 0 {
        "No expired locks found".to_string()
    } else {
        format!("Released {} expired seat locks", outcome.released_count)
    };
    Ok(ok(&message, outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseUserLocksRequest {
    seat_ids: Vec<i64>,
}

// POST /api/admin/seats/release
//
// Any authenticated caller may release any seat's lock; ownership is not
// checked here on purpose. See DESIGN.md before changing this.
async fn release_user_locks(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ReleaseUserLocksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.seat_ids.is_empty() {
        return Err(ApiError::bad_request("seatIds array is required"));
    }

    let outcome = state
        .reclaimer
        .release_user_locks(&req.seat_ids, user.user_id)
        .await?;

    let message = format!("Released locks for {} seats", outcome.released_count);
    Ok(ok(&message, outcome))
}

// GET /api/admin/seats/{seat_id}/lock
async fn get_lock_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
    Path(seat_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.reclaimer.lock_status(seat_id).await? {
        Some(view) => Ok(ok("Seat lock status retrieved", view)),
        None => Err(ApiError::not_found("Seat not found")),
    }
}
