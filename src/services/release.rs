use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ReservationError;
use crate::models::{EventId, SeatId};
use crate::store::SeatStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedSeat {
    pub seat_id: SeatId,
    pub seat_number: String,
    #[serde(skip)]
    pub event_id: EventId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub released: Vec<ReleasedSeat>,
    /// Места, на которых хранилище вернуло ошибку. Их можно отпустить повторно.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<SeatId>,
}

impl ReleaseReport {
    /// События, чьи места поменялись (для инвалидации кеша).
    pub fn touched_events(&self) -> Vec<EventId> {
        let mut events: Vec<EventId> = self.released.iter().map(|s| s.event_id).collect();
        events.sort();
        events.dedup();
        events
    }
}

/// Досрочное снятие брони.
#[derive(Clone)]
pub struct ReleaseEngine {
    store: Arc<dyn SeatStore>,
}

impl ReleaseEngine {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        Self { store }
    }

    /// Каждое место отпускается отдельно: сбой на одном не мешает остальным.
    /// Свободные и проданные места молча пропускаются.
    pub async fn release(
        &self,
        seat_ids: &[SeatId],
        holder: Option<&str>,
    ) -> Result<ReleaseReport, ReservationError> {
        if seat_ids.is_empty() {
            return Err(ReservationError::validation("seat_ids must not be empty"));
        }

        let mut report = ReleaseReport::default();
        let mut seen = HashSet::with_capacity(seat_ids.len());

        for &seat_id in seat_ids {
            if !seen.insert(seat_id) {
                continue;
            }
            match self.store.release_seat(seat_id, holder).await {
                Ok(Some(seat)) => report.released.push(ReleasedSeat {
                    seat_id: seat.id,
                    seat_number: seat.seat_number,
                    event_id: seat.event_id,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to release seat {}: {}", seat_id, e);
                    report.failed.push(seat_id);
                }
            }
        }

        info!(
            requested = seen.len(),
            released = report.released.len(),
            failed = report.failed.len(),
            "Seats released"
        );
        Ok(report)
    }
}
