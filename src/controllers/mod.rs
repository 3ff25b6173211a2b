pub mod admin;
pub mod bookings;
pub mod seats;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use axum::Router;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(bookings::routes())
        .merge(admin::routes())
}

/// Success envelope shared by every endpoint.
pub(crate) fn ok<T: Serialize>(
    message: &str,
    data: T,
) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": message,
            "data": data,
        })),
    )
}
