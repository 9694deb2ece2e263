use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ids::{EventId, HolderToken, SeatId, SectionId, TicketOptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "seat_status", rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Reserved,
    Sold,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Seat {
    pub id: SeatId,
    pub event_id: EventId,
    pub ticket_option_id: TicketOptionId,
    pub section_id: Option<SectionId>,
    pub seat_number: String,
    pub row_label: String,
    pub position_in_row: i32,
    pub status: SeatStatus,
    pub reserved_until: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub held_by: Option<HolderToken>,
}

impl Seat {
    /// Бронь истекла (или битая: `reserved` без `reserved_until`).
    /// Такое место логически свободно, даже если свипер ещё не отработал.
    pub fn hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Reserved && self.reserved_until.map_or(true, |until| until < now)
    }

    pub fn is_logically_available(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Available || self.hold_lapsed(now)
    }

    /// Статус с учётом истечения брони. Именно его видят клиенты.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.hold_lapsed(now) {
            SeatStatus::Available
        } else {
            self.status
        }
    }

    /// Причина, по которой место нельзя забронировать в контексте события.
    pub fn reserve_blocker(&self, event_id: EventId, now: DateTime<Utc>) -> Option<UnavailableReason> {
        if self.event_id != event_id {
            return Some(UnavailableReason::NotFound);
        }
        if self.is_logically_available(now) {
            return None;
        }
        match self.status {
            SeatStatus::Sold => Some(UnavailableReason::Sold),
            _ => Some(UnavailableReason::Reserved),
        }
    }

    /// Причина, по которой место нельзя включить в заказ: оно должно быть
    /// под живой бронью, и той же сессии, если обе стороны её указали.
    pub fn checkout_blocker(
        &self,
        event_id: EventId,
        holder: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<UnavailableReason> {
        if self.event_id != event_id {
            return Some(UnavailableReason::NotFound);
        }
        match self.status {
            SeatStatus::Sold => Some(UnavailableReason::Sold),
            SeatStatus::Available => Some(UnavailableReason::NotHeld),
            SeatStatus::Reserved if self.hold_lapsed(now) => Some(UnavailableReason::HoldExpired),
            SeatStatus::Reserved => match (holder, self.held_by.as_deref()) {
                (Some(mine), Some(theirs)) if mine != theirs => Some(UnavailableReason::HeldByOther),
                _ => None,
            },
        }
    }

    /// Может ли `holder` снять бронь с этого места.
    pub fn releasable_by(&self, holder: Option<&str>) -> bool {
        if self.status != SeatStatus::Reserved {
            return false;
        }
        match (holder, self.held_by.as_deref()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotFound,
    Reserved,
    Sold,
    NotHeld,
    HoldExpired,
    HeldByOther,
    InPendingOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableSeat {
    pub seat_id: SeatId,
    pub reason: UnavailableReason,
}

/// Сверяет запрошенные id с загруженными строками. Порядок результата
/// совпадает с порядком запроса.
pub fn collect_unavailable<F>(requested: &[SeatId], loaded: &[Seat], mut blocker: F) -> Vec<UnavailableSeat>
where
    F: FnMut(&Seat) -> Option<UnavailableReason>,
{
    requested
        .iter()
        .filter_map(|seat_id| {
            let reason = match loaded.iter().find(|s| s.id == *seat_id) {
                Some(seat) => blocker(seat)?,
                None => UnavailableReason::NotFound,
            };
            Some(UnavailableSeat { seat_id: *seat_id, reason })
        })
        .collect()
}

/// Представление места для списка доступности (кешируется в Redis).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub id: SeatId,
    pub ticket_option_id: TicketOptionId,
    pub section_id: Option<SectionId>,
    pub seat_number: String,
    pub row_label: String,
    pub position_in_row: i32,
    pub status: SeatStatus,
    pub reserved_until: Option<DateTime<Utc>>,
}

impl SeatView {
    pub fn at(seat: &Seat, now: DateTime<Utc>) -> Self {
        let status = seat.effective_status(now);
        Self {
            id: seat.id,
            ticket_option_id: seat.ticket_option_id,
            section_id: seat.section_id,
            seat_number: seat.seat_number.clone(),
            row_label: seat.row_label.clone(),
            position_in_row: seat.position_in_row,
            status,
            reserved_until: if status == SeatStatus::Reserved { seat.reserved_until } else { None },
        }
    }
}

pub fn sort_for_display(seats: &mut [Seat]) {
    seats.sort_by(|a, b| {
        a.row_label
            .cmp(&b.row_label)
            .then(a.position_in_row.cmp(&b.position_in_row))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seat(status: SeatStatus, reserved_until: Option<DateTime<Utc>>) -> Seat {
        Seat {
            id: SeatId::new(),
            event_id: EventId::new(),
            ticket_option_id: TicketOptionId::new(),
            section_id: None,
            seat_number: "A1".to_string(),
            row_label: "A".to_string(),
            position_in_row: 1,
            status,
            reserved_until,
            held_by: None,
        }
    }

    #[test]
    fn expired_hold_is_logically_available() {
        let now = Utc::now();
        let s = seat(SeatStatus::Reserved, Some(now - Duration::seconds(1)));
        assert!(s.is_logically_available(now));
        assert_eq!(s.effective_status(now), SeatStatus::Available);
        assert_eq!(s.reserve_blocker(s.event_id, now), None);
    }

    #[test]
    fn live_hold_blocks_with_reserved_reason() {
        let now = Utc::now();
        let s = seat(SeatStatus::Reserved, Some(now + Duration::minutes(5)));
        assert_eq!(s.reserve_blocker(s.event_id, now), Some(UnavailableReason::Reserved));
    }

    #[test]
    fn hold_expiring_exactly_now_is_still_live() {
        let now = Utc::now();
        let s = seat(SeatStatus::Reserved, Some(now));
        assert!(!s.is_logically_available(now));
    }

    #[test]
    fn sold_is_never_available() {
        let now = Utc::now();
        let s = seat(SeatStatus::Sold, None);
        assert_eq!(s.reserve_blocker(s.event_id, now), Some(UnavailableReason::Sold));
        assert!(!s.releasable_by(None));
    }

    #[test]
    fn seat_of_other_event_is_not_found() {
        let now = Utc::now();
        let s = seat(SeatStatus::Available, None);
        assert_eq!(s.reserve_blocker(EventId::new(), now), Some(UnavailableReason::NotFound));
    }

    #[test]
    fn holder_must_match_for_release_and_checkout() {
        let now = Utc::now();
        let mut s = seat(SeatStatus::Reserved, Some(now + Duration::minutes(5)));
        s.held_by = Some("alice".to_string());

        assert!(s.releasable_by(Some("alice")));
        assert!(!s.releasable_by(Some("bob")));
        assert!(s.releasable_by(None));

        assert_eq!(s.checkout_blocker(s.event_id, Some("alice"), now), None);
        assert_eq!(
            s.checkout_blocker(s.event_id, Some("bob"), now),
            Some(UnavailableReason::HeldByOther)
        );
    }

    #[test]
    fn collect_unavailable_keeps_request_order_and_reports_missing() {
        let now = Utc::now();
        let free = seat(SeatStatus::Available, None);
        let sold = Seat { event_id: free.event_id, ..seat(SeatStatus::Sold, None) };
        let missing = SeatId::new();

        let requested = vec![missing, free.id, sold.id];
        let loaded = vec![sold.clone(), free.clone()];
        let result = collect_unavailable(&requested, &loaded, |s| s.reserve_blocker(free.event_id, now));

        assert_eq!(
            result,
            vec![
                UnavailableSeat { seat_id: missing, reason: UnavailableReason::NotFound },
                UnavailableSeat { seat_id: sold.id, reason: UnavailableReason::Sold },
            ]
        );
    }

    #[test]
    fn view_hides_lapsed_expiry() {
        let now = Utc::now();
        let s = seat(SeatStatus::Reserved, Some(now - Duration::minutes(1)));
        let view = SeatView::at(&s, now);
        assert_eq!(view.status, SeatStatus::Available);
        assert_eq!(view.reserved_until, None);
    }
}
