use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ids::{EventId, TicketOptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "seat_type", rename_all = "lowercase")]
pub enum SeatType {
    /// Входной билет без конкретного места. Строк в `seats` нет.
    General,
    /// Места с номерами; `quantity` лишь справочно.
    Assigned,
}

// Ценовая категория
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketOption {
    pub id: TicketOptionId,
    pub event_id: EventId,
    pub name: String,
    /// Цена в минимальных единицах валюты (тиын/центы).
    pub price_cents: i64,
    pub quantity: i32,
    pub seat_type: SeatType,
}
