pub mod booking;
pub mod event;
pub mod seat;
pub mod ticket;
pub mod user;
pub mod venue;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use event::Event;
pub use seat::{effective_status, Seat, SeatStatus};
pub use ticket::{Ticket, TicketStatus};
pub use user::User;
pub use venue::Venue;
