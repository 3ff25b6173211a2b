use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub capacity: i32,
}

impl Venue {
    pub async fn find(id: Uuid, pool: &sqlx::PgPool) -> Result<Option<Venue>, sqlx::Error> {
        sqlx::query_as::<_, Venue>("SELECT id, name, address, capacity FROM venues WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
