use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ids::{EventId, HolderToken, OrderId, SeatId, TicketOptionId};
use super::seat::SeatStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub event_id: EventId,
    pub status: OrderStatus,
    pub payment_reference: Option<String>,
    pub total_cents: i64,
    #[serde(skip)]
    pub holder: Option<HolderToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: OrderId,
    pub ticket_option_id: TicketOptionId,
    /// Только позиции с местом интересны ядру бронирования.
    pub seat_id: Option<SeatId>,
    pub price_cents: i64,
}

/// Терминальный результат платежа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentOutcome {
    /// Статусы платёжного шлюза. Нетерминальные (`NEW`, `AUTHORIZED`, ...) дают `None`.
    pub fn from_gateway_status(status: &str) -> Option<Self> {
        match status.to_ascii_uppercase().as_str() {
            "CONFIRMED" | "SUCCEEDED" | "COMPLETED" => Some(PaymentOutcome::Succeeded),
            "FAILED" | "REJECTED" | "EXPIRED" => Some(PaymentOutcome::Failed),
            "CANCELLED" | "CANCELED" => Some(PaymentOutcome::Canceled),
            _ => None,
        }
    }

    pub fn seat_status(self) -> SeatStatus {
        match self {
            PaymentOutcome::Succeeded => SeatStatus::Sold,
            PaymentOutcome::Failed | PaymentOutcome::Canceled => SeatStatus::Available,
        }
    }

    pub fn order_status(self) -> OrderStatus {
        match self {
            PaymentOutcome::Succeeded => OrderStatus::Completed,
            PaymentOutcome::Failed | PaymentOutcome::Canceled => OrderStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_statuses_map_to_outcomes() {
        assert_eq!(PaymentOutcome::from_gateway_status("CONFIRMED"), Some(PaymentOutcome::Succeeded));
        assert_eq!(PaymentOutcome::from_gateway_status("completed"), Some(PaymentOutcome::Succeeded));
        assert_eq!(PaymentOutcome::from_gateway_status("REJECTED"), Some(PaymentOutcome::Failed));
        assert_eq!(PaymentOutcome::from_gateway_status("EXPIRED"), Some(PaymentOutcome::Failed));
        assert_eq!(PaymentOutcome::from_gateway_status("CANCELLED"), Some(PaymentOutcome::Canceled));
        assert_eq!(PaymentOutcome::from_gateway_status("NEW"), None);
        assert_eq!(PaymentOutcome::from_gateway_status("AUTHORIZED"), None);
    }

    #[test]
    fn outcomes_target_states() {
        assert_eq!(PaymentOutcome::Succeeded.seat_status(), SeatStatus::Sold);
        assert_eq!(PaymentOutcome::Canceled.seat_status(), SeatStatus::Available);
        assert_eq!(PaymentOutcome::Failed.order_status(), OrderStatus::Failed);
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }
}
