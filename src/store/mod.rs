//! Хранилище мест и заказов.
//!
//! Вся взаимная блокировка между запросами (и между инстансами сервиса)
//! обеспечивается транзакциями и row-level локами хранилища, а не памятью процесса.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{
    EventId, HolderToken, Order, OrderId, OrderStatus, PaymentOutcome, Seat, SeatId, UnavailableSeat,
};

pub mod memory;
pub mod postgres;

pub use memory::MemorySeatStore;
pub use postgres::PgSeatStore;

/// Запрос на удержание пачки мест. `seat_ids` уже провалидированы (без дублей).
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub now: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub holder: Option<HolderToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    Held(Vec<Seat>),
    Rejected(Vec<UnavailableSeat>),
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub holder: Option<HolderToken>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Placed(Order),
    Rejected(Vec<UnavailableSeat>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub order_id: OrderId,
    pub event_id: EventId,
    pub outcome: PaymentOutcome,
    pub order_status: OrderStatus,
    /// Сколько мест реально сменили статус (0 при повторной доставке).
    pub seats_changed: u64,
    /// `false`, если заказ уже был закрыт другим исходом и ничего не менялось.
    pub applied: bool,
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Проверка и удержание всей пачки в одной транзакции: либо все места, либо ни одного.
    async fn hold_seats(&self, request: &HoldRequest) -> Result<HoldOutcome, StoreError>;

    /// `reserved AND reserved_until < now` -> `available`. Возвращает число мест.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Снимает бронь с одного места. `None`, если место не было под бронью
    /// (свободно, продано, не найдено) или удержано другой сессией.
    async fn release_seat(&self, seat_id: SeatId, holder: Option<&str>) -> Result<Option<Seat>, StoreError>;

    /// Переводит места заказа и сам заказ в терминальное состояние одной транзакцией.
    /// `None`, если заказа нет.
    async fn finalize_order(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Option<FinalizeSummary>, StoreError>;

    async fn event_seats(&self, event_id: EventId) -> Result<Vec<Seat>, StoreError>;

    async fn seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>, StoreError>;

    /// Создаёт `pending` заказ на места, удерживаемые вызывающим.
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderOutcome, StoreError>;

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<bool, StoreError>;

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, StoreError>;

    /// `pending` заказы, созданные раньше `created_before` (с платежом или без).
    async fn stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}
