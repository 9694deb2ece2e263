pub mod availability;
pub mod orders;
pub mod payment;
pub mod reconciler;
pub mod release;
pub mod reservation;
pub mod retry;
pub mod sweeper;

pub use availability::AvailabilityService;
pub use orders::{OrderService, PaymentSession, PlaceOrderCommand};
pub use payment::PaymentGatewayClient;
pub use reconciler::{NotificationDisposition, PaymentReconciler};
pub use release::{ReleaseEngine, ReleaseReport, ReleasedSeat};
pub use reservation::{Reservation, ReservationEngine, ReserveCommand, ReserveOutcome};
pub use retry::RetryPolicy;
pub use sweeper::ExpirySweeper;

use std::collections::HashSet;

use crate::error::ReservationError;
use crate::models::SeatId;

/// Общая проверка списка мест: не пустой, не длиннее лимита, без дублей.
pub(crate) fn validate_seat_ids(seat_ids: &[SeatId], max_batch_size: usize) -> Result<(), ReservationError> {
    if seat_ids.is_empty() {
        return Err(ReservationError::validation("seat_ids must not be empty"));
    }
    if seat_ids.len() > max_batch_size {
        return Err(ReservationError::validation(format!(
            "at most {} seats per request, got {}",
            max_batch_size,
            seat_ids.len()
        )));
    }
    let mut seen = HashSet::with_capacity(seat_ids.len());
    for seat_id in seat_ids {
        if !seen.insert(seat_id) {
            return Err(ReservationError::validation(format!("duplicate seat id {}", seat_id)));
        }
    }
    Ok(())
}
