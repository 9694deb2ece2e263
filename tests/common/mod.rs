#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;

use seat_reservations::{
    clock::{Clock, ManualClock},
    config::Config,
    models::{
        EventId, Order, OrderId, OrderItem, OrderStatus, Seat, SeatId, SeatStatus, SeatType, TicketOption,
        TicketOptionId,
    },
    services::{PaymentGatewayClient, ReserveCommand, ReserveOutcome},
    store::{MemorySeatStore, SeatStore},
    AppState,
};

pub const SEAT_PRICE: i64 = 5_000;

pub fn test_config() -> Config {
    Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "postgres://localhost/unused".to_string()))
        .expect("test config")
}

/// Событие с одной ценовой категорией и рядом мест в in-memory хранилище.
pub struct Fixture {
    pub store: MemorySeatStore,
    pub clock: Arc<ManualClock>,
    pub state: Arc<AppState>,
    pub event_id: EventId,
    pub ticket_option_id: TicketOptionId,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_gateway(None).await
    }

    pub async fn with_gateway(gateway: Option<PaymentGatewayClient>) -> Self {
        let store = MemorySeatStore::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let event_id = EventId::new();
        let ticket_option_id = TicketOptionId::new();

        store
            .insert_ticket_option(TicketOption {
                id: ticket_option_id,
                event_id,
                name: "Партер".to_string(),
                price_cents: SEAT_PRICE,
                quantity: 100,
                seat_type: SeatType::Assigned,
            })
            .await;

        let shared: Arc<dyn SeatStore> = Arc::new(store.clone());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let state = Arc::new(AppState::new(test_config(), shared, dyn_clock, None, gateway));

        Self { store, clock, state, event_id, ticket_option_id }
    }

    pub async fn seed_seats(&self, count: usize) -> Vec<SeatId> {
        self.seed_row("A", count).await
    }

    pub async fn seed_row(&self, row: &str, count: usize) -> Vec<SeatId> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let seat = Seat {
                id: SeatId::new(),
                event_id: self.event_id,
                ticket_option_id: self.ticket_option_id,
                section_id: None,
                seat_number: format!("{}{}", row, i + 1),
                row_label: row.to_string(),
                position_in_row: i as i32 + 1,
                status: SeatStatus::Available,
                reserved_until: None,
                held_by: None,
            };
            ids.push(seat.id);
            self.store.insert_seat(seat).await;
        }
        ids
    }

    pub async fn seed_sold(&self) -> SeatId {
        let id = self.seed_row("Z", 1).await[0];
        let mut seat = self.seat(id).await;
        seat.status = SeatStatus::Sold;
        self.store.insert_seat(seat).await;
        id
    }

    pub async fn seat(&self, seat_id: SeatId) -> Seat {
        self.store.seat(seat_id).await.expect("seat exists")
    }

    pub async fn status(&self, seat_id: SeatId) -> SeatStatus {
        self.seat(seat_id).await.status
    }

    pub fn command(&self, seat_ids: &[SeatId], holder: Option<&str>) -> ReserveCommand {
        ReserveCommand {
            event_id: self.event_id,
            seat_ids: seat_ids.to_vec(),
            hold_minutes: Some(10),
            holder: holder.map(str::to_string),
        }
    }

    pub async fn reserve(&self, seat_ids: &[SeatId], holder: Option<&str>) -> ReserveOutcome {
        self.state
            .reservations
            .reserve(self.command(seat_ids, holder))
            .await
            .expect("reserve call")
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    /// `pending` заказ на указанные места напрямую в хранилище, минуя checkout.
    pub async fn insert_pending_order(&self, seat_ids: &[SeatId], reference: Option<&str>) -> OrderId {
        let now = self.clock.now();
        let order_id = OrderId::new();
        let items = seat_ids
            .iter()
            .map(|&seat_id| OrderItem {
                id: uuid::Uuid::new_v4(),
                order_id,
                ticket_option_id: self.ticket_option_id,
                seat_id: Some(seat_id),
                price_cents: SEAT_PRICE,
            })
            .collect();
        let order = Order {
            id: order_id,
            event_id: self.event_id,
            status: OrderStatus::Pending,
            payment_reference: reference.map(str::to_string),
            total_cents: SEAT_PRICE * seat_ids.len() as i64,
            holder: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_order(order, items).await;
        order_id
    }
}

pub fn expect_reserved(outcome: ReserveOutcome) -> seat_reservations::services::Reservation {
    match outcome {
        ReserveOutcome::Reserved(reservation) => reservation,
        ReserveOutcome::Rejected(unavailable) => panic!("expected reservation, got {:?}", unavailable),
    }
}
