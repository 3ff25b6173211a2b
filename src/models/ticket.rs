use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Valid,
    Used,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub ticket_type: String,
    pub status: TicketStatus,
    pub row_label: Option<String>,
    pub seat_number: Option<String>,
    pub section: Option<String>,
    pub ticket_number: Option<String>,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
}
