use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::ReservationConfig;
use crate::error::ReservationError;
use crate::models::{EventId, HolderToken, Seat, SeatId, UnavailableSeat};
use crate::services::{validate_seat_ids, ExpirySweeper};
use crate::store::{HoldOutcome, HoldRequest, SeatStore};

#[derive(Debug, Clone)]
pub struct ReserveCommand {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    /// `None` - срок удержания по умолчанию из конфигурации.
    pub hold_minutes: Option<u32>,
    pub holder: Option<HolderToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub seats: Vec<Seat>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    Rejected(Vec<UnavailableSeat>),
}

/// Переводит пачку мест в `reserved` по принципу "всё или ничего".
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    sweeper: ExpirySweeper,
    config: ReservationConfig,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        sweeper: ExpirySweeper,
        config: ReservationConfig,
    ) -> Self {
        Self { store, clock, sweeper, config }
    }

    fn hold_minutes(&self, requested: Option<u32>) -> Result<u32, ReservationError> {
        let minutes = requested.unwrap_or(self.config.default_hold_minutes);
        if minutes == 0 || minutes > self.config.max_hold_minutes {
            return Err(ReservationError::validation(format!(
                "hold_minutes must be between 1 and {}, got {}",
                self.config.max_hold_minutes, minutes
            )));
        }
        Ok(minutes)
    }

    pub async fn reserve(&self, command: ReserveCommand) -> Result<ReserveOutcome, ReservationError> {
        // Валидация до любого обращения к хранилищу
        validate_seat_ids(&command.seat_ids, self.config.max_batch_size)?;
        let minutes = self.hold_minutes(command.hold_minutes)?;

        // Свип не обязателен: просроченная бронь и так считается свободной
        self.sweeper.sweep_best_effort().await;

        let now = self.clock.now();
        let until = now + Duration::minutes(i64::from(minutes));
        let request = HoldRequest {
            event_id: command.event_id,
            seat_ids: command.seat_ids,
            now,
            until,
            holder: command.holder,
        };

        match self.store.hold_seats(&request).await? {
            HoldOutcome::Held(seats) => {
                info!(
                    event_id = %request.event_id,
                    seats = seats.len(),
                    expires_at = %until,
                    "Seats reserved"
                );
                Ok(ReserveOutcome::Reserved(Reservation { seats, expires_at: until }))
            }
            HoldOutcome::Rejected(unavailable) => {
                debug!(
                    event_id = %request.event_id,
                    unavailable = unavailable.len(),
                    "Reservation rejected"
                );
                Ok(ReserveOutcome::Rejected(unavailable))
            }
        }
    }
}
