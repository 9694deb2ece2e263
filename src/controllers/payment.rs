use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{error::ReservationError, services::NotificationDisposition, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/payment", post(payment_webhook))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentNotification {
    payment_id: String,
    status: String,
}

/// POST /api/webhook/payment
///
/// Получение всегда подтверждается, кроме сбоя хранилища: тогда 503,
/// и шлюз доставит уведомление повторно.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PaymentNotification>, JsonRejection>,
) -> Result<impl IntoResponse, ReservationError> {
    let Json(payload) = body?;
    tracing::info!("Webhook: payment_id={}, status={}", payload.payment_id, payload.status);

    match state.reconciler.handle_notification(&payload.payment_id, &payload.status).await {
        Ok(NotificationDisposition::Finalized(summary)) => {
            if summary.seats_changed > 0 {
                state.invalidate_seats(summary.event_id).await;
            }
        }
        Ok(NotificationDisposition::Ignored | NotificationDisposition::UnknownPayment) => {}
        Err(ReservationError::Store(e)) => return Err(ReservationError::Store(e)),
        Err(e) => tracing::warn!("Webhook for payment {} not applied: {}", payload.payment_id, e),
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}
