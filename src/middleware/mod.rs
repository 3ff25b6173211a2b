use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::User;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(ApiError::unauthorized)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or_else(ApiError::unauthorized)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| ApiError::unauthorized())?;

        let credentials = String::from_utf8(decoded).map_err(|_| ApiError::unauthorized())?;

        let mut parts_iter = credentials.splitn(2, ':');
        let email = parts_iter.next().ok_or_else(ApiError::unauthorized)?;
        let password = parts_iter.next().ok_or_else(ApiError::unauthorized)?;

        let user = User::find_by_email(email, &state.db.pool)
            .await
            .map_err(|_| ApiError::internal("Authentication backend error"))?
            .ok_or_else(ApiError::unauthorized)?;

        if !user.verify_password(password) {
            return Err(ApiError::unauthorized());
        }

        sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&state.db.pool)
            .await
            .ok(); // not worth failing the request over

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        })
    }
}

/// Extractor for admin-only endpoints.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}
