//! In-memory хранилище для тестов и локального запуска.
//!
//! Один `tokio::sync::Mutex` на всё состояние: каждая операция сериализуема,
//! что совпадает с гарантиями транзакций Postgres-реализации.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{FinalizeSummary, HoldOutcome, HoldRequest, OrderOutcome, OrderRequest, SeatStore};
use crate::error::StoreError;
use crate::models::{
    seat::{collect_unavailable, sort_for_display},
    EventId, Order, OrderId, OrderItem, OrderStatus, PaymentOutcome, Seat, SeatId, SeatStatus, TicketOption,
    UnavailableReason,
};

#[derive(Default)]
struct MemoryState {
    seats: HashMap<SeatId, Seat>,
    ticket_options: HashMap<crate::models::TicketOptionId, TicketOption>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
}

impl MemoryState {
    fn order_seat_ids(&self, order_id: OrderId) -> Vec<SeatId> {
        self.items
            .iter()
            .filter(|item| item.order_id == order_id)
            .filter_map(|item| item.seat_id)
            .collect()
    }

    fn in_pending_order(&self, seat_id: SeatId) -> bool {
        self.items.iter().any(|item| {
            item.seat_id == Some(seat_id)
                && self
                    .orders
                    .get(&item.order_id)
                    .is_some_and(|o| o.status == OrderStatus::Pending)
        })
    }

    fn load(&self, ids: &[SeatId]) -> Vec<Seat> {
        ids.iter().filter_map(|id| self.seats.get(id).cloned()).collect()
    }
}

#[derive(Clone, Default)]
pub struct MemorySeatStore {
    state: Arc<Mutex<MemoryState>>,
    failures: Arc<AtomicUsize>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_ticket_option(&self, option: TicketOption) {
        self.state.lock().await.ticket_options.insert(option.id, option);
    }

    pub async fn insert_seat(&self, seat: Seat) {
        self.state.lock().await.seats.insert(seat.id, seat);
    }

    pub async fn insert_order(&self, order: Order, items: Vec<OrderItem>) {
        let mut state = self.state.lock().await;
        state.orders.insert(order.id, order);
        state.items.extend(items);
    }

    pub async fn seat(&self, seat_id: SeatId) -> Option<Seat> {
        self.state.lock().await.seats.get(&seat_id).cloned()
    }

    /// Следующие `n` вызовов хранилища завершатся `StoreError::Unavailable`.
    pub fn fail_next_calls(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

fn clear_hold(seat: &mut Seat, status: SeatStatus) {
    seat.status = status;
    seat.reserved_until = None;
    seat.held_by = None;
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn hold_seats(&self, request: &HoldRequest) -> Result<HoldOutcome, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        let loaded = state.load(&request.seat_ids);
        let unavailable = collect_unavailable(&request.seat_ids, &loaded, |seat| {
            seat.reserve_blocker(request.event_id, request.now)
        });
        if !unavailable.is_empty() {
            return Ok(HoldOutcome::Rejected(unavailable));
        }

        let mut held = Vec::with_capacity(request.seat_ids.len());
        for seat_id in &request.seat_ids {
            if let Some(seat) = state.seats.get_mut(seat_id) {
                seat.status = SeatStatus::Reserved;
                seat.reserved_until = Some(request.until);
                seat.held_by = request.holder.clone();
                held.push(seat.clone());
            }
        }

        sort_for_display(&mut held);
        Ok(HoldOutcome::Held(held))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        let mut count = 0;
        for seat in state.seats.values_mut() {
            if seat.hold_lapsed(now) {
                clear_hold(seat, SeatStatus::Available);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn release_seat(&self, seat_id: SeatId, holder: Option<&str>) -> Result<Option<Seat>, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        match state.seats.get_mut(&seat_id) {
            Some(seat) if seat.releasable_by(holder) => {
                clear_hold(seat, SeatStatus::Available);
                Ok(Some(seat.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finalize_order(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Option<FinalizeSummary>, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        let Some(order) = state.orders.get(&order_id).cloned() else {
            return Ok(None);
        };

        let target = outcome.order_status();
        if order.status.is_terminal() {
            // Места закрытого заказа не трогаем: их могли уже забронировать заново
            return Ok(Some(FinalizeSummary {
                order_id,
                event_id: order.event_id,
                outcome,
                order_status: order.status,
                seats_changed: 0,
                applied: order.status == target,
            }));
        }

        let mut seats_changed = 0;
        for seat_id in state.order_seat_ids(order_id) {
            let Some(seat) = state.seats.get_mut(&seat_id) else { continue };
            let changes = match outcome {
                PaymentOutcome::Succeeded => seat.status != SeatStatus::Sold,
                PaymentOutcome::Failed | PaymentOutcome::Canceled => seat.status == SeatStatus::Reserved,
            };
            if changes {
                clear_hold(seat, outcome.seat_status());
                seats_changed += 1;
            }
        }

        if let Some(stored) = state.orders.get_mut(&order_id) {
            if stored.status != target {
                stored.status = target;
                stored.updated_at = Utc::now();
            }
        }

        Ok(Some(FinalizeSummary {
            order_id,
            event_id: order.event_id,
            outcome,
            order_status: target,
            seats_changed,
            applied: true,
        }))
    }

    async fn event_seats(&self, event_id: EventId) -> Result<Vec<Seat>, StoreError> {
        self.injected_failure()?;
        let state = self.state.lock().await;

        let mut seats: Vec<Seat> = state.seats.values().filter(|s| s.event_id == event_id).cloned().collect();
        sort_for_display(&mut seats);
        Ok(seats)
    }

    async fn seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>, StoreError> {
        self.injected_failure()?;
        let state = self.state.lock().await;

        let mut seats = state.load(seat_ids);
        sort_for_display(&mut seats);
        Ok(seats)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderOutcome, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        let loaded = state.load(&request.seat_ids);
        let unavailable = collect_unavailable(&request.seat_ids, &loaded, |seat| {
            if state.in_pending_order(seat.id) {
                return Some(UnavailableReason::InPendingOrder);
            }
            seat.checkout_blocker(request.event_id, request.holder.as_deref(), request.now)
        });
        if !unavailable.is_empty() {
            return Ok(OrderOutcome::Rejected(unavailable));
        }

        let order_id = OrderId::new();
        let items: Vec<OrderItem> = loaded
            .iter()
            .map(|seat| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                ticket_option_id: seat.ticket_option_id,
                seat_id: Some(seat.id),
                price_cents: state
                    .ticket_options
                    .get(&seat.ticket_option_id)
                    .map(|o| o.price_cents)
                    .unwrap_or_default(),
            })
            .collect();

        let order = Order {
            id: order_id,
            event_id: request.event_id,
            status: OrderStatus::Pending,
            payment_reference: None,
            total_cents: items.iter().map(|i| i.price_cents).sum(),
            holder: request.holder.clone(),
            created_at: request.now,
            updated_at: request.now,
        };

        state.orders.insert(order_id, order.clone());
        state.items.extend(items);
        Ok(OrderOutcome::Placed(order))
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<bool, StoreError> {
        self.injected_failure()?;
        let mut state = self.state.lock().await;

        match state.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.payment_reference = Some(reference.to_string());
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        self.injected_failure()?;
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        self.injected_failure()?;
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        self.injected_failure()?;
        let state = self.state.lock().await;

        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < created_before)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
