pub mod ids;
pub mod order;
pub mod seat;
pub mod ticket_option;

pub use ids::{EventId, HolderToken, OrderId, SeatId, SectionId, TicketOptionId};
pub use order::{Order, OrderItem, OrderStatus, PaymentOutcome};
pub use seat::{Seat, SeatStatus, SeatView, UnavailableReason, UnavailableSeat};
pub use ticket_option::{SeatType, TicketOption};
