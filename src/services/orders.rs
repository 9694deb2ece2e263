use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ReservationError;
use crate::models::{EventId, HolderToken, Order, OrderId, OrderStatus, SeatId};
use crate::services::payment::{GatewayError, PaymentInit};
use crate::services::{validate_seat_ids, PaymentGatewayClient};
use crate::store::{OrderOutcome, OrderRequest, SeatStore};

#[derive(Debug, Clone)]
pub struct PlaceOrderCommand {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub holder: Option<HolderToken>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub order_id: OrderId,
    pub payment_id: String,
    pub payment_url: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub expires_at: Option<String>,
}

/// Оформление заказа на удержанные места и запуск оплаты.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    gateway: Option<PaymentGatewayClient>,
    max_batch_size: usize,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        gateway: Option<PaymentGatewayClient>,
        max_batch_size: usize,
    ) -> Self {
        Self { store, clock, gateway, max_batch_size }
    }

    /// Создаёт `pending` заказ. Статус мест не меняется: они остаются под бронью
    /// до исхода платежа.
    pub async fn place_order(&self, command: PlaceOrderCommand) -> Result<Order, ReservationError> {
        validate_seat_ids(&command.seat_ids, self.max_batch_size)?;

        let request = OrderRequest {
            event_id: command.event_id,
            seat_ids: command.seat_ids,
            holder: command.holder,
            now: self.clock.now(),
        };

        match self.store.create_order(&request).await? {
            OrderOutcome::Placed(order) => {
                info!(
                    order_id = %order.id,
                    event_id = %order.event_id,
                    seats = request.seat_ids.len(),
                    total_cents = order.total_cents,
                    "Order placed"
                );
                Ok(order)
            }
            OrderOutcome::Rejected(unavailable) => Err(ReservationError::Conflict(unavailable)),
        }
    }

    pub async fn find_order(&self, order_id: OrderId) -> Result<Order, ReservationError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or(ReservationError::OrderNotFound(order_id))
    }

    pub async fn initiate_payment(&self, order_id: OrderId) -> Result<PaymentSession, ReservationError> {
        let gateway = self.gateway.as_ref().ok_or(GatewayError::NotConfigured)?;

        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(ReservationError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::Pending || order.payment_reference.is_some() {
            return Err(ReservationError::OrderNotPayable(order_id));
        }

        let response = gateway
            .create_payment(PaymentInit {
                order_id: order_id.to_string(),
                amount: order.total_cents,
                description: format!("Order {}", order_id),
            })
            .await?;
        let payment_id = response
            .payment_id
            .ok_or_else(|| GatewayError::Rejected("response without paymentId".to_string()))?;

        if !self.store.set_payment_reference(order_id, &payment_id).await? {
            // Заказ успели закрыть, пока создавался платёж
            warn!("Order {} closed while payment {} was being created", order_id, payment_id);
            return Err(ReservationError::OrderNotPayable(order_id));
        }

        info!(order_id = %order_id, payment_id = %payment_id, "Payment initiated");
        Ok(PaymentSession {
            order_id,
            payment_id,
            payment_url: response.payment_url,
            amount_cents: order.total_cents,
            currency: gateway.currency().to_string(),
            expires_at: response.expires_at,
        })
    }
}
