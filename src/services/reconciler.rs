use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::ReservationError;
use crate::models::{Order, OrderId, PaymentOutcome};
use crate::services::{PaymentGatewayClient, RetryPolicy};
use crate::store::{FinalizeSummary, SeatStore};

const AUTHORIZED: &str = "AUTHORIZED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDisposition {
    /// Нетерминальный статус (`NEW`, неподтверждённый `AUTHORIZED`, ...).
    Ignored,
    /// Платёж не связан ни с одним заказом.
    UnknownPayment,
    Finalized(FinalizeSummary),
}

/// Применяет исход платежа к местам заказа.
#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    gateway: Option<PaymentGatewayClient>,
    retry: RetryPolicy,
    pending_timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        gateway: Option<PaymentGatewayClient>,
        retry: RetryPolicy,
        pending_timeout: Duration,
    ) -> Self {
        Self { store, clock, gateway, retry, pending_timeout }
    }

    /// Идемпотентно: повторная доставка того же исхода ничего не меняет.
    /// Временные сбои хранилища повторяются целой транзакцией.
    pub async fn finalize(&self, order_id: OrderId, outcome: PaymentOutcome) -> Result<FinalizeSummary, ReservationError> {
        let summary = self
            .retry
            .run("finalize_order", move || self.store.finalize_order(order_id, outcome))
            .await?
            .ok_or(ReservationError::OrderNotFound(order_id))?;

        if summary.applied {
            info!(
                order_id = %order_id,
                outcome = ?outcome,
                order_status = ?summary.order_status,
                seats_changed = summary.seats_changed,
                "Order finalized"
            );
        } else {
            warn!(
                order_id = %order_id,
                outcome = ?outcome,
                order_status = ?summary.order_status,
                "Order already closed with another outcome, ignoring"
            );
        }
        Ok(summary)
    }

    /// Уведомление шлюза о статусе платежа.
    pub async fn handle_notification(
        &self,
        payment_id: &str,
        status: &str,
    ) -> Result<NotificationDisposition, ReservationError> {
        info!("Processing payment notification: payment_id={}, status={}", payment_id, status);

        let terminal = PaymentOutcome::from_gateway_status(status);
        let authorized = status.eq_ignore_ascii_case(AUTHORIZED);
        if terminal.is_none() && !authorized {
            debug!("Payment {} status {} needs no action", payment_id, status);
            return Ok(NotificationDisposition::Ignored);
        }

        let order = self
            .retry
            .run("find_order_by_payment_reference", move || {
                self.store.find_order_by_payment_reference(payment_id)
            })
            .await?;
        let Some(order) = order else {
            warn!("Payment {} not found in database", payment_id);
            return Ok(NotificationDisposition::UnknownPayment);
        };

        let outcome = match terminal {
            Some(outcome) => outcome,
            None if self.try_confirm(payment_id).await => PaymentOutcome::Succeeded,
            None => {
                // Остаётся pending, добьёт фоновая сверка
                warn!("Could not auto-confirm payment {}, leaving order {} pending", payment_id, order.id);
                return Ok(NotificationDisposition::Ignored);
            }
        };

        let summary = self.finalize(order.id, outcome).await?;
        Ok(NotificationDisposition::Finalized(summary))
    }

    async fn try_confirm(&self, payment_id: &str) -> bool {
        let Some(gateway) = self.gateway.as_ref().filter(|g| g.is_available()) else {
            return false;
        };
        match gateway.confirm_authorized(payment_id).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                warn!("Failed to confirm payment {}: {}", payment_id, e);
                false
            }
        }
    }

    /// Закрывает `pending` заказы старше таймаута. Возвращает число закрытых.
    pub async fn reconcile_stale_orders(&self) -> Result<usize, ReservationError> {
        let cutoff = self.clock.now() - self.pending_timeout;
        let orders = self
            .retry
            .run("stale_pending_orders", move || self.store.stale_pending_orders(cutoff))
            .await?;
        if orders.is_empty() {
            return Ok(0);
        }

        info!("Found {} stale pending orders", orders.len());
        let mut closed = 0;
        for order in orders {
            let outcome = self.resolve_stale(&order).await;
            match self.finalize(order.id, outcome).await {
                Ok(summary) if summary.applied => closed += 1,
                Ok(_) => {}
                Err(e) => warn!("Failed to finalize stale order {}: {}", order.id, e),
            }
        }
        Ok(closed)
    }

    /// Исход для зависшего заказа: статус из шлюза, если его можно узнать,
    /// иначе `Canceled`, чтобы места вернулись в пул.
    async fn resolve_stale(&self, order: &Order) -> PaymentOutcome {
        let Some(reference) = order.payment_reference.as_deref() else {
            return PaymentOutcome::Canceled;
        };
        let Some(gateway) = self.gateway.as_ref() else {
            return PaymentOutcome::Canceled;
        };
        if !gateway.is_available() {
            warn!("Circuit breaker is OPEN, canceling stale order {} without status check", order.id);
            return PaymentOutcome::Canceled;
        }

        match gateway.check_payment_status(reference).await {
            Ok(check) => match check.status.as_deref() {
                Some(status) if status.eq_ignore_ascii_case(AUTHORIZED) => {
                    // Деньги уже авторизованы: пробуем списать, но место в любом случае продано
                    if !self.try_confirm(reference).await {
                        error!("Payment {} authorized but not confirmed, order {} marked sold", reference, order.id);
                    }
                    PaymentOutcome::Succeeded
                }
                Some(status) => PaymentOutcome::from_gateway_status(status).unwrap_or(PaymentOutcome::Canceled),
                None => PaymentOutcome::Canceled,
            },
            Err(e) => {
                warn!("Failed to check stale payment {}: {}", reference, e);
                PaymentOutcome::Canceled
            }
        }
    }

    pub fn spawn_periodic(self, interval: tokio::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match self.reconcile_stale_orders().await {
                    Ok(0) => {}
                    Ok(closed) => info!("Closed {} stale pending orders", closed),
                    Err(e) => error!("Stale order reconciliation failed: {}", e),
                }
            }
        })
    }
}
