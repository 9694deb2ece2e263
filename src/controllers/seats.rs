use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ReservationError,
    middleware::SessionHolder,
    models::{EventId, SeatId, SeatView, UnavailableSeat},
    services::{ReleaseReport, ReserveCommand, ReserveOutcome},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/seats", get(get_event_seats))
        .route("/seats/reserve", post(reserve_seats))
        .route("/seats/release", post(release_seats))
        .route("/seats/sweep", post(sweep_expired))
}

// GET /api/events/{event_id}/seats
async fn get_event_seats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
) -> Result<Json<Vec<SeatView>>, ReservationError> {
    // Поколение читаем до похода в БД: если между чтением и записью был коммит,
    // снимок ляжет под устаревшее поколение и читателям не достанется
    let generation = match &state.cache {
        Some(cache) => match cache.seats_generation(event_id).await {
            Ok(generation) => Some((cache, generation)),
            Err(e) => {
                tracing::warn!("Seats cache generation read failed for event {}: {:?}", event_id, e);
                None
            }
        },
        None => None,
    };

    if let Some((cache, generation)) = generation {
        match cache.get_event_seats(event_id, generation).await {
            Ok(Some(seats)) => return Ok(Json(seats)),
            Ok(None) => {}
            Err(e) => tracing::warn!("Seats cache read failed for event {}: {:?}", event_id, e),
        }
    }

    let seats = state.availability.event_seats(event_id).await?;

    if let Some((cache, generation)) = generation {
        if let Err(e) = cache.save_event_seats(event_id, generation, &seats, state.clock.now()).await {
            tracing::warn!("Seats cache write failed for event {}: {:?}", event_id, e);
        }
    }

    Ok(Json(seats))
}

// POST /api/seats/reserve
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ReserveRequest {
    event_id: EventId,
    #[validate(length(min = 1, message = "нужно выбрать хотя бы одно место"))]
    seat_ids: Vec<SeatId>,
    #[validate(range(min = 1, message = "срок брони должен быть положительным"))]
    hold_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservedResponse {
    ok: bool,
    seats: Vec<SeatView>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct RejectedResponse {
    ok: bool,
    unavailable: Vec<UnavailableSeat>,
}

async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    holder: SessionHolder,
    body: Result<Json<ReserveRequest>, JsonRejection>,
) -> Result<Response, ReservationError> {
    let Json(req) = body?;
    req.validate()?;

    let event_id = req.event_id;
    let outcome = state
        .reservations
        .reserve(ReserveCommand {
            event_id,
            seat_ids: req.seat_ids,
            hold_minutes: req.hold_minutes,
            holder: holder.0,
        })
        .await?;

    match outcome {
        ReserveOutcome::Reserved(reservation) => {
            state.invalidate_seats(event_id).await;
            let now = state.clock.now();
            let body = ReservedResponse {
                ok: true,
                seats: reservation.seats.iter().map(|s| SeatView::at(s, now)).collect(),
                expires_at: reservation.expires_at,
            };
            Ok((StatusCode::OK, Json(body)).into_response())
        }
        ReserveOutcome::Rejected(unavailable) => {
            Ok((StatusCode::CONFLICT, Json(RejectedResponse { ok: false, unavailable })).into_response())
        }
    }
}

// POST /api/seats/release
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ReleaseRequest {
    #[validate(length(min = 1, message = "нужно указать хотя бы одно место"))]
    seat_ids: Vec<SeatId>,
}

async fn release_seats(
    State(state): State<Arc<AppState>>,
    holder: SessionHolder,
    body: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Result<Json<ReleaseReport>, ReservationError> {
    let Json(req) = body?;
    req.validate()?;

    let report = state.releases.release(&req.seat_ids, holder.as_deref()).await?;
    join_all(report.touched_events().into_iter().map(|event_id| state.invalidate_seats(event_id))).await;
    Ok(Json(report))
}

// POST /api/seats/sweep
async fn sweep_expired(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ReservationError> {
    // Кеш не трогаем: в нём уже эффективные статусы, а TTL не переживает ближайшую бронь
    let count = state.sweeper.sweep_expired().await?;
    Ok(Json(json!({ "count": count })))
}
