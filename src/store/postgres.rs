use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{FinalizeSummary, HoldOutcome, HoldRequest, OrderOutcome, OrderRequest, SeatStore};
use crate::error::StoreError;
use crate::models::{
    ids::uuids,
    seat::{collect_unavailable, sort_for_display},
    EventId, Order, OrderId, PaymentOutcome, Seat, SeatId, TicketOptionId, UnavailableReason,
};

const SEAT_COLUMNS: &str = "id, event_id, ticket_option_id, section_id, seat_number, row_label, \
                            position_in_row, status, reserved_until, held_by";

const ORDER_COLUMNS: &str = "id, event_id, status, payment_reference, total_cents, holder, created_at, updated_at";

// Места заказа. Используется как подзапрос, $1 = order_id.
const ORDER_SEATS: &str = "SELECT seat_id FROM order_items WHERE order_id = $1 AND seat_id IS NOT NULL";

#[derive(Clone)]
pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn hold_seats(&self, request: &HoldRequest) -> Result<HoldOutcome, StoreError> {
        let ids = uuids(request.seat_ids.iter().copied());
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE в порядке id: две пересекающиеся пачки встают в очередь,
        // а не видят обе "available" и не ловят deadlock.
        let locked = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await?;

        let unavailable = collect_unavailable(&request.seat_ids, &locked, |seat| {
            seat.reserve_blocker(request.event_id, request.now)
        });
        if !unavailable.is_empty() {
            tx.rollback().await?;
            debug!(event_id = %request.event_id, blocked = unavailable.len(), "hold rejected");
            return Ok(HoldOutcome::Rejected(unavailable));
        }

        let mut held = sqlx::query_as::<_, Seat>(&format!(
            "UPDATE seats
             SET status = 'reserved', reserved_until = $2, held_by = $3, updated_at = NOW()
             WHERE id = ANY($1)
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(&ids[..])
        .bind(request.until)
        .bind(request.holder.as_deref())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        sort_for_display(&mut held);
        Ok(HoldOutcome::Held(held))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        // Один условный UPDATE: безопасно гонять параллельно и сколько угодно раз
        let result = sqlx::query(
            "UPDATE seats
             SET status = 'available', reserved_until = NULL, held_by = NULL, updated_at = NOW()
             WHERE status = 'reserved' AND (reserved_until < $1 OR reserved_until IS NULL)",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn release_seat(&self, seat_id: SeatId, holder: Option<&str>) -> Result<Option<Seat>, StoreError> {
        let released = sqlx::query_as::<_, Seat>(&format!(
            "UPDATE seats
             SET status = 'available', reserved_until = NULL, held_by = NULL, updated_at = NOW()
             WHERE id = $1
               AND status = 'reserved'
               AND ($2::TEXT IS NULL OR held_by IS NULL OR held_by = $2)
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(seat_id)
        .bind(holder)
        .fetch_optional(&self.pool)
        .await?;

        Ok(released)
    }

    async fn finalize_order(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Option<FinalizeSummary>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order) = order else {
            tx.rollback().await?;
            return Ok(None);
        };

        let target = outcome.order_status();
        if order.status.is_terminal() {
            // Заказ уже закрыт: повтор того же исхода или другой исход, места не трогаем.
            // Освобождённые места могли уже забронировать другие покупатели.
            tx.rollback().await?;
            return Ok(Some(FinalizeSummary {
                order_id,
                event_id: order.event_id,
                outcome,
                order_status: order.status,
                seats_changed: 0,
                applied: order.status == target,
            }));
        }

        // Сначала лочим места в том же порядке, что и hold_seats
        sqlx::query(&format!("SELECT id FROM seats WHERE id IN ({ORDER_SEATS}) ORDER BY id FOR UPDATE"))
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let seats_update = match outcome {
            PaymentOutcome::Succeeded => format!(
                "UPDATE seats
                 SET status = 'sold', reserved_until = NULL, held_by = NULL, updated_at = NOW()
                 WHERE status <> 'sold' AND id IN ({ORDER_SEATS})"
            ),
            // Проданное место не возвращаем в пул ни при каком исходе
            PaymentOutcome::Failed | PaymentOutcome::Canceled => format!(
                "UPDATE seats
                 SET status = 'available', reserved_until = NULL, held_by = NULL, updated_at = NOW()
                 WHERE status = 'reserved' AND id IN ({ORDER_SEATS})"
            ),
        };
        let seats_changed = sqlx::query(&seats_update)
            .bind(order_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status <> $2")
            .bind(order_id)
            .bind(target)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

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
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE event_id = $1 ORDER BY row_label, position_in_row, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(seats)
    }

    async fn seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>, StoreError> {
        let ids = uuids(seat_ids.iter().copied());
        let mut seats = sqlx::query_as::<_, Seat>(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1)"))
            .bind(&ids[..])
            .fetch_all(&self.pool)
            .await?;

        sort_for_display(&mut seats);
        Ok(seats)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderOutcome, StoreError> {
        let ids = uuids(request.seat_ids.iter().copied());
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await?;

        let in_pending: Vec<SeatId> = sqlx::query_scalar(
            "SELECT oi.seat_id
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE o.status = 'pending' AND oi.seat_id = ANY($1)",
        )
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await?;

        let unavailable = collect_unavailable(&request.seat_ids, &locked, |seat| {
            if in_pending.contains(&seat.id) {
                return Some(UnavailableReason::InPendingOrder);
            }
            seat.checkout_blocker(request.event_id, request.holder.as_deref(), request.now)
        });
        if !unavailable.is_empty() {
            tx.rollback().await?;
            return Ok(OrderOutcome::Rejected(unavailable));
        }

        let option_ids: Vec<Uuid> = uuids(locked.iter().map(|s| s.ticket_option_id));
        let prices: Vec<(TicketOptionId, i64)> =
            sqlx::query_as("SELECT id, price_cents FROM ticket_options WHERE id = ANY($1)")
                .bind(&option_ids[..])
                .fetch_all(&mut *tx)
                .await?;
        let price_of = |option: TicketOptionId| {
            prices
                .iter()
                .find(|(id, _)| *id == option)
                .map(|(_, price)| *price)
                .unwrap_or_default()
        };
        let total: i64 = locked.iter().map(|s| price_of(s.ticket_option_id)).sum();

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (id, event_id, status, total_cents, holder, created_at, updated_at)
             VALUES ($1, $2, 'pending', $3, $4, $5, $5)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderId::new())
        .bind(request.event_id)
        .bind(total)
        .bind(request.holder.as_deref())
        .bind(request.now)
        .fetch_one(&mut *tx)
        .await?;

        for seat in &locked {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, ticket_option_id, seat_id, price_cents)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(seat.ticket_option_id)
            .bind(seat.id)
            .bind(price_of(seat.ticket_option_id))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(OrderOutcome::Placed(order))
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_reference = $2, updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE status = 'pending' AND created_at < $1
             ORDER BY created_at"
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
