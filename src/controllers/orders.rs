use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ReservationError,
    middleware::SessionHolder,
    models::{EventId, Order, OrderId, OrderStatus, PaymentOutcome, SeatId},
    services::{PaymentSession, PlaceOrderCommand},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/payment", post(initiate_payment))
        .route("/orders/{order_id}/finalize", post(finalize_order))
}

// POST /api/orders
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderRequest {
    event_id: EventId,
    #[validate(length(min = 1, message = "нужно указать хотя бы одно место"))]
    seat_ids: Vec<SeatId>,
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    holder: SessionHolder,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ReservationError> {
    let Json(req) = body?;
    req.validate()?;

    let order = state
        .orders
        .place_order(PlaceOrderCommand { event_id: req.event_id, seat_ids: req.seat_ids, holder: holder.0 })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

// GET /api/orders/{order_id}
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, ReservationError> {
    let order = state.orders.find_order(order_id).await?;
    Ok(Json(order))
}

// POST /api/orders/{order_id}/payment
async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<PaymentSession>, ReservationError> {
    let session = state.orders.initiate_payment(order_id).await?;
    Ok(Json(session))
}

// POST /api/orders/{order_id}/finalize
#[derive(Debug, Deserialize)]
struct FinalizeRequest {
    outcome: PaymentOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeResponse {
    order_id: OrderId,
    order_status: OrderStatus,
    seats_changed: u64,
    applied: bool,
}

async fn finalize_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<FinalizeResponse>, ReservationError> {
    let Json(req) = body?;
    let summary = state.reconciler.finalize(order_id, req.outcome).await?;
    if summary.seats_changed > 0 {
        state.invalidate_seats(summary.event_id).await;
    }

    Ok(Json(FinalizeResponse {
        order_id,
        order_status: summary.order_status,
        seats_changed: summary.seats_changed,
        applied: summary.applied,
    }))
}
