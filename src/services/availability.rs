use std::sync::Arc;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::{EventId, SeatView};
use crate::services::ExpirySweeper;
use crate::store::SeatStore;

/// Чтение схемы мест события с эффективным статусом.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    sweeper: ExpirySweeper,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>, sweeper: ExpirySweeper) -> Self {
        Self { store, clock, sweeper }
    }

    pub async fn event_seats(&self, event_id: EventId) -> Result<Vec<SeatView>, StoreError> {
        self.sweeper.sweep_best_effort().await;

        let now = self.clock.now();
        let seats = self.store.event_seats(event_id).await?;
        Ok(seats.iter().map(|seat| SeatView::at(seat, now)).collect())
    }
}
