use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub status: String,
    pub start_time: DateTime<Utc>,
}

impl Event {
    pub async fn find(id: Uuid, pool: &sqlx::PgPool) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            "SELECT id, venue_id, name, description, base_price, status, start_time
             FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
